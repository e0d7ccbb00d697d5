use crate::adapters::onebot::{LockedWriter, send_msg};
use crate::config::build_config;
use crate::event::Context;
use crate::message::Message;
use crate::plugins::{PluginError, command_enabled, command_table};
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

/// /help - 列出当前启用的全部指令
pub fn handle(
    _content: String,
    ctx: Context,
    writer: LockedWriter,
) -> BoxFuture<'static, Result<(), PluginError>> {
    Box::pin(async move {
        let (group_id, user_id) = {
            let Some(msg) = ctx.as_message() else {
                return Ok(());
            };
            (msg.group_id(), msg.user_id())
        };

        let enabled: Vec<_> = command_table()
            .iter()
            .filter(|cmd| command_enabled(&ctx, cmd.name))
            .collect();

        let mut text = String::from(
            "🎮 ARC Raiders 查询机器人\n\
             ━━━━━━━━━━━━━━━━━━━\n\
             ▎可用命令:\n",
        );
        for cmd in &enabled {
            text.push_str(&format!("▎/{} - {}\n", cmd.name, cmd.description));
        }
        text.push_str("━━━━━━━━━━━━━━━━━━━\n▎📖 命令详解:\n");
        for cmd in &enabled {
            text.push_str(&format!("▎• {}\n", cmd.usage));
        }
        text.push_str(
            "━━━━━━━━━━━━━━━━━━━\n\
             ▎💡 使用技巧:\n\
             ▎查询命令后可加 list 查看完整列表\n\
             ▎例如: /map list\n\
             ━━━━━━━━━━━━━━━━━━━\n\
             🌟 祝你游戏愉快！",
        );

        send_msg(writer, group_id, Some(user_id), Message::from(text)).await
    })
}
