use crate::adapters::onebot::{LockedWriter, send_msg};
use crate::command::split_trailing_level;
use crate::config::build_config;
use crate::event::Context;
use crate::message::Message;
use crate::plugins::{PluginError, is_list_query, reply_with_asset};
use crate::resources::{Category, ResourceError};
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

/// /weapon <武器名称> [等级] - 查询武器图片（默认1级）
/// /weapon list - 列出所有武器
///
/// 等级由内容末尾的正整数 Token 给出，如 "/weapon 示例武器 2"。
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
            let usage = "🔫 武器查询命令\n\
                         ━━━━━━━━━━━━━━━\n\
                         📖 使用方法:\n\
                         • /weapon <武器名称> - 查询武器（默认1级）\n\
                         • /weapon <武器名称> <等级> - 查询指定等级\n\
                         • /weapon list - 查看所有武器\n\
                         ━━━━━━━━━━━━━━━\n\
                         💡 示例: /weapon 示例武器 2";
            return send_msg(writer, group_id, Some(user_id), Message::from(usage)).await;
        }

        let index = ctx.resources.index(Category::Weapons);

        if is_list_query(query) {
            if index.is_empty() {
                return send_msg(writer, group_id, Some(user_id), Message::from("📭 暂无可用武器"))
                    .await;
            }

            let mut text = String::from("🔫 ARC Raiders 武器列表\n━━━━━━━━━━━━━━━\n");
            for entry in index.entries() {
                text.push_str(&format!("• {}", entry.name));
                if entry.has_levels() {
                    let levels: Vec<String> = entry
                        .available_levels()
                        .iter()
                        .map(|lv| lv.to_string())
                        .collect();
                    text.push_str(&format!(" [Lv.{}]", levels.join("/")));
                }
                if !entry.aliases.is_empty() {
                    text.push_str(&format!(" ({})", entry.aliases.join("、")));
                }
                text.push('\n');
            }
            text.push_str("━━━━━━━━━━━━━━━\n💡 使用 /weapon <武器名称> [等级] 查询详情");
            return send_msg(writer, group_id, Some(user_id), Message::from(text)).await;
        }

        // 末尾的正整数视为等级，其余部分为武器名称
        let (name, level) = split_trailing_level(query);

        let Some(entry) = index.resolve(name) else {
            let reply = Message::new().reply(message_id).text(format!(
                "❌ 未找到武器: {}\n💡 使用 /weapon list 查看所有可用武器",
                name
            ));
            return send_msg(writer, group_id, Some(user_id), reply).await;
        };

        match entry.asset_for_level(level) {
            Ok(filename) => {
                reply_with_asset(
                    &ctx,
                    writer,
                    group_id,
                    user_id,
                    message_id,
                    Category::Weapons,
                    &entry,
                    filename,
                )
                .await
            }
            Err(ResourceError::LevelNotFound { level, available }) => {
                let levels: Vec<String> = available.iter().map(|lv| lv.to_string()).collect();
                let reply = Message::new().reply(message_id).text(format!(
                    "❌ [{}] 没有 {} 级\n📋 可用等级: {}",
                    entry.name,
                    level,
                    levels.join("、")
                ));
                send_msg(writer, group_id, Some(user_id), reply).await
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
