use crate::adapters::onebot::{LockedWriter, send_msg};
use crate::config::build_config;
use crate::event::Context;
use crate::message::Message;
use crate::plugins::{PluginError, get_config};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use toml::Value;

#[derive(Serialize, Deserialize, Default)]
struct Config {
    #[serde(default)]
    enabled: bool,
    /// 允许执行重载的用户 ID，为空表示不限制
    #[serde(default)]
    admins: Vec<i64>,
}

pub fn default_config() -> Value {
    build_config(Config {
        enabled: true,
        admins: Vec::new(),
    })
}

/// /reload - 重新读取全部资源文档并原子替换索引。
/// 单个类别解析失败时保留其旧索引，并在回复中说明。
pub fn handle(
    _content: String,
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        let (group_id, user_id, message_id) = {
            let Some(msg) = ctx.as_message() else {
                return Ok(());
            };
            (msg.group_id(), msg.user_id(), msg.message_id())
        };

        let config: Config = get_config(&ctx, "reload").unwrap_or_default();
        if !config.admins.is_empty() && !config.admins.contains(&user_id) {
            let reply = Message::new()
                .reply(message_id)
                .text("❌ 没有权限执行该操作");
            return send_msg(writer, group_id, Some(user_id), reply).await;
        }

        let summary = ctx.resources.reload().await;

        let mut text = format!("🔄 资源重载完成，共 {} 个条目", summary.total());
        for (category, count) in &summary.loaded {
            text.push_str(&format!("\n• {}: {} 个", category, count));
        }
        for (category, reason) in &summary.failed {
            text.push_str(&format!("\n⚠️ {} 重载失败，保留旧索引: {}", category, reason));
        }

        let reply = Message::new().reply(message_id).text(text);
        send_msg(writer, group_id, Some(user_id), reply).await
    })
}
