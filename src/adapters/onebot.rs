use crate::config::{AppConfig, BotConfig};
use crate::event::{BotStatus, Context, Event, EventType, LoginUser};
use crate::matcher::Matcher;
use crate::resources::Resources;
use crate::uploader::Uploader;
use crate::{error, info, plugins, warn};
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, StreamExt};
use http::HeaderValue;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};

pub mod api;

pub type BotError = Box<dyn std::error::Error + Send + Sync>;

pub type TraitSink =
    Box<dyn Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin>;
pub type LockedWriter = Arc<AsyncMutex<TraitSink>>;

#[derive(Serialize)]
struct SendParams<M> {
    message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    message: M,
}

#[derive(Serialize)]
struct SendFrame<M> {
    action: &'static str,
    params: SendParams<M>,
}

/// 适配器入口函数 (Adapter Entry)
pub fn entry(
    bot_config: BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    resources: Arc<Resources>,
    uploader: Arc<Uploader>,
) -> BoxFuture<'static, ()> {
    Box::pin(async move { run_bot_loop(bot_config, global_config, resources, uploader).await })
}

/// OneBot 协议的主循环逻辑
pub async fn run_bot_loop(
    bot_config: BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    resources: Arc<Resources>,
    uploader: Arc<Uploader>,
) {
    let bot_url = bot_config
        .url
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());
    loop {
        match connect_and_listen(
            &bot_config,
            global_config.clone(),
            resources.clone(),
            uploader.clone(),
        )
        .await
        {
            Ok(()) => warn!(target: "Bot", "Bot [{}] 连接断开，3秒后重连...", bot_url),
            Err(e) => {
                error!(target: "Bot", "Bot [{}] 连接失败: {}。3秒后重试...", bot_url, e)
            }
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
}

async fn connect_and_listen(
    config: &BotConfig,
    global_config: Arc<RwLock<AppConfig>>,
    resources: Arc<Resources>,
    uploader: Arc<Uploader>,
) -> Result<(), BotError> {
    let url = config
        .url
        .as_deref()
        .ok_or_else(|| Box::<dyn std::error::Error + Send + Sync>::from("OneBot URL 未配置"))?;

    let mut request = url.into_client_request()?;

    if let Some(token) = &config.access_token
        && !token.is_empty()
    {
        let token_header = format!("Bearer {}", token);
        request
            .headers_mut()
            .insert("Authorization", HeaderValue::from_str(&token_header)?);
    }

    let (ws_stream, _) = connect_async(request).await?;
    info!(target: "Bot", "Bot [{}] 连接成功！(OneBot)", url);

    let (write_half, mut read_half) = ws_stream.split();

    let writer: LockedWriter = Arc::new(AsyncMutex::new(Box::new(write_half)));
    let matcher = Arc::new(Matcher::new());

    // 初始化 Bot 状态容器
    let bot_status = Arc::new(RwLock::new(BotStatus {
        adapter: "onebot".to_string(),
        platform: "qq".to_string(),
        login_user: LoginUser {
            id: "0".to_string(),
            ..Default::default()
        },
    }));

    // 启动后台任务获取登录信息
    {
        let status_ref = bot_status.clone();
        let writer_ref = writer.clone();
        let matcher_ref = matcher.clone();
        let config_ref = global_config.clone();
        let resources_ref = resources.clone();
        let uploader_ref = uploader.clone();

        tokio::spawn(async move {
            // 稍微延时等待连接稳定
            tokio::time::sleep(Duration::from_secs(1)).await;

            // 构建临时上下文用于调用 API
            let ctx = Context {
                event: EventType::Init,
                config: config_ref,
                resources: resources_ref,
                uploader: uploader_ref,
                matcher: matcher_ref,
                bot: status_ref.read().unwrap().clone(),
            };

            match api::get_login_info(&ctx, writer_ref).await {
                Ok(login) => {
                    let mut guard = status_ref.write().unwrap();
                    guard.login_user.id = login.user_id.to_string();
                    guard.login_user.name = Some(login.nickname.clone());
                    info!(target: "Bot", "已获取登录信息: {} ({})", login.nickname, login.user_id);
                }
                Err(e) => {
                    warn!(target: "Bot", "获取登录信息失败: {}", e);
                }
            }
        });
    }

    while let Some(message) = read_half.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                let mut data = text.as_bytes().to_vec();

                let writer = writer.clone();
                let config = global_config.clone();
                let resources = resources.clone();
                let uploader = uploader.clone();
                let matcher = matcher.clone();
                let bot_status_ref = bot_status.clone();

                // 每个事件独立处理，慢请求不会阻塞后续消息
                tokio::spawn(async move {
                    let current_status = bot_status_ref.read().unwrap().clone();

                    if let Err(e) = process_frame(
                        &mut data,
                        writer,
                        config,
                        resources,
                        uploader,
                        matcher,
                        current_status,
                    )
                    .await
                    {
                        error!(target: "Bot", "Event processing error: {}", e);
                    }
                });
            }
            Ok(WsMessage::Close(_)) => return Ok(()),
            Err(e) => return Err(Box::new(e)),
            _ => {}
        }
    }
    Ok(())
}

/// 解析单个 WebSocket 帧并送入指令分发
pub async fn process_frame(
    data: &mut [u8],
    writer: LockedWriter,
    config: Arc<RwLock<AppConfig>>,
    resources: Arc<Resources>,
    uploader: Arc<Uploader>,
    matcher: Arc<Matcher>,
    bot: BotStatus,
) -> Result<(), BotError> {
    let event: Event = match simd_json::to_owned_value(data) {
        Ok(v) => v,
        Err(_) => return Ok(()),
    };

    // 优先尝试分发给等待者 (API 响应)
    let event = match matcher.dispatch(event).await {
        Some(e) => e,
        None => return Ok(()),
    };

    let ctx = Context {
        event: EventType::Onebot(event),
        config,
        resources,
        uploader,
        matcher,
        bot,
    };

    plugins::dispatch(ctx, writer).await?;
    Ok(())
}

/// 发送消息（群聊或私聊，目标 ID 为 0 时忽略）
pub async fn send_msg<M>(
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: Option<i64>,
    message: M,
) -> Result<(), BotError>
where
    M: Serialize,
{
    let (msg_type, target_group, target_user) = if let Some(gid) = group_id.filter(|&id| id != 0) {
        ("group", Some(gid), None)
    } else if let Some(uid) = user_id.filter(|&id| id != 0) {
        ("private", None, Some(uid))
    } else {
        return Ok(());
    };

    let frame = SendFrame {
        action: "send_msg",
        params: SendParams {
            message_type: msg_type,
            group_id: target_group,
            user_id: target_user,
            message,
        },
    };

    let json_str = simd_json::to_string(&frame)?;
    send_frame_raw(writer, json_str).await
}

pub async fn send_frame_raw(writer: LockedWriter, json_str: String) -> Result<(), BotError> {
    let mut guard = writer.lock().await;
    guard.send(WsMessage::Text(json_str.into())).await?;
    Ok(())
}
