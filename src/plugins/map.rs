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

/// /map <地图名称> - 查询地图图片
/// /map list - 列出所有地图
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
            let usage = "🗺️ 地图查询命令\n\
                         ━━━━━━━━━━━━━━━\n\
                         📖 使用方法:\n\
                         • /map <地图名称> - 查询地图\n\
                         • /map list - 查看所有地图\n\
                         ━━━━━━━━━━━━━━━\n\
                         💡 示例: /map 示例地图";
            return send_msg(writer, group_id, Some(user_id), Message::from(usage)).await;
        }

        let index = ctx.resources.index(Category::Maps);

        if is_list_query(query) {
            if index.is_empty() {
                return send_msg(writer, group_id, Some(user_id), Message::from("📭 暂无可用地图"))
                    .await;
            }

            let mut text = String::from("🗺️ ARC Raiders 地图列表\n━━━━━━━━━━━━━━━\n");
            for (i, entry) in index.entries().enumerate() {
                text.push_str(&format!("{}. {}", i + 1, entry.name));
                if !entry.aliases.is_empty() {
                    text.push_str(&format!(" ({})", entry.aliases.join("、")));
                }
                text.push('\n');
            }
            text.push_str("━━━━━━━━━━━━━━━\n💡 使用 /map <地图名称> 查询详情");
            return send_msg(writer, group_id, Some(user_id), Message::from(text)).await;
        }

        let Some(entry) = index.resolve(query) else {
            let reply = Message::new().reply(message_id).text(format!(
                "❌ 未找到地图: {}\n💡 使用 /map list 查看所有可用地图",
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
                    Category::Maps,
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
