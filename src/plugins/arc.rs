use crate::adapters::onebot::{LockedWriter, send_msg};
use crate::config::build_config;
use crate::event::Context;
use crate::message::Message;
use crate::plugins::{PluginError, is_list_query, reply_with_asset};
use crate::resources::Category;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use toml::Value;

#[derive(Serialize, Deserialize)]
struct Config {
    enabled: bool,
}

pub fn default_config() -> Value {
    build_config(Config { enabled: true })
}

/// /arc <关键词> - 查询游戏相关资料图
/// /arc list - 列出所有信息
pub fn handle(
    content: String,
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

        let query = content.trim();

        if query.is_empty() {
            let usage = "🎮 ARC Raiders 信息查询\n\
                         ━━━━━━━━━━━━━━━\n\
                         📖 使用方法:\n\
                         • /arc <关键词> - 查询信息\n\
                         • /arc list - 查看所有信息\n\
                         ━━━━━━━━━━━━━━━\n\
                         💡 示例: /arc 介绍";
            return send_msg(writer, group_id, Some(user_id), Message::from(usage)).await;
        }

        let index = ctx.resources.index(Category::Arc);

        if is_list_query(query) {
            if index.is_empty() {
                return send_msg(writer, group_id, Some(user_id), Message::from("📭 暂无可用信息"))
                    .await;
            }

            let mut text = String::from("🎮 ARC Raiders 信息列表\n━━━━━━━━━━━━━━━\n");
            for (i, entry) in index.entries().enumerate() {
                text.push_str(&format!("{}. {}", i + 1, entry.name));
                if !entry.aliases.is_empty() {
                    text.push_str(&format!(" ({})", entry.aliases.join("、")));
                }
                text.push('\n');
            }
            text.push_str("━━━━━━━━━━━━━━━\n💡 使用 /arc <关键词> 查询详情");
            return send_msg(writer, group_id, Some(user_id), Message::from(text)).await;
        }

        let Some(entry) = index.resolve(query) else {
            let reply = Message::new().reply(message_id).text(format!(
                "❌ 未找到相关信息: {}\n💡 使用 /arc list 查看所有可用信息",
                query
            ));
            return send_msg(writer, group_id, Some(user_id), reply).await;
        };

        match entry.asset_for_level(None) {
            Ok(filename) => {
                reply_with_asset(
                    &ctx,
                    writer,
                    group_id,
                    user_id,
                    message_id,
                    Category::Arc,
                    &entry,
                    filename,
                )
                .await
            }
            Err(e) => {
                let reply = Message::new()
                    .reply(message_id)
                    .text(format!("❌ {}", e));
                send_msg(writer, group_id, Some(user_id), reply).await
            }
        }
    })
}
