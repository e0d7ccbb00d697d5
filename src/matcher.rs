use crate::event::Event;
use simd_json::derived::ValueObjectAccessAsScalar;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot};

/// API 响应匹配器。
/// 每个带 echo 的请求注册一个等待者，收到携带相同 echo 的帧时唤醒。
pub struct Matcher {
    pending: AsyncMutex<HashMap<String, oneshot::Sender<Event>>>,
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            pending: AsyncMutex::new(HashMap::new()),
        }
    }

    /// 注册一个响应等待者 (Echo)。
    /// 必须在发送请求帧之前完成注册，否则响应可能先于等待者到达。
    pub async fn register(&self, echo: String) -> oneshot::Receiver<Event> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(echo, tx);
        rx
    }

    /// 等待已注册的响应，超时返回 None 并清理等待者
    pub async fn wait_resp(
        &self,
        echo: &str,
        rx: oneshot::Receiver<Event>,
        timeout_duration: Duration,
    ) -> Option<Event> {
        match tokio::time::timeout(timeout_duration, rx).await {
            Ok(Ok(event)) => Some(event),
            _ => {
                self.pending.lock().await.remove(echo);
                None
            }
        }
    }

    /// 尝试分发事件给等待者。如果事件被消费（echo 匹配），返回 None；否则返回原事件。
    pub async fn dispatch(&self, event: Event) -> Option<Event> {
        let echo = match event.get_str("echo") {
            Some(e) => e.to_string(),
            None => return Some(event),
        };

        let mut guard = self.pending.lock().await;
        if let Some(sender) = guard.remove(&echo) {
            // 发送事件给等待者。忽略错误（如等待者已超时）
            let _ = sender.send(event);
            None
        } else {
            Some(event)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simd_json::json;

    #[tokio::test]
    async fn event_without_echo_passes_through() {
        let matcher = Matcher::new();
        let event: Event = json!({"post_type": "message"});
        assert!(matcher.dispatch(event).await.is_some());
    }

    #[tokio::test]
    async fn matching_echo_wakes_waiter() {
        let matcher = Matcher::new();
        let rx = matcher.register("req-1".into()).await;

        let resp: Event = json!({"echo": "req-1", "retcode": 0});
        assert!(matcher.dispatch(resp).await.is_none());

        let got = matcher
            .wait_resp("req-1", rx, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(got.get_str("echo"), Some("req-1"));
    }

    #[tokio::test]
    async fn unmatched_echo_is_returned() {
        let matcher = Matcher::new();
        let resp: Event = json!({"echo": "nobody-waits"});
        assert!(matcher.dispatch(resp).await.is_some());
    }

    #[tokio::test]
    async fn timeout_cleans_up_waiter() {
        let matcher = Matcher::new();
        let rx = matcher.register("slow".into()).await;
        assert!(
            matcher
                .wait_resp("slow", rx, Duration::from_millis(5))
                .await
                .is_none()
        );

        // 等待者已清理，迟到的响应被放行
        let late: Event = json!({"echo": "slow"});
        assert!(matcher.dispatch(late).await.is_some());
    }
}
