use crate::adapters::onebot::{LockedWriter, send_msg};
use crate::command::parse_command;
use crate::event::Context;
use crate::message::Message;
use crate::resources::{Category, ResourceEntry};
use crate::{error, info};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;
use toml::Value;

pub mod arc;
pub mod help;
pub mod map;
pub mod reload;
pub mod weapon;

pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

/// 指令处理函数：接收关键字之后的内容与消息上下文，通过 writer 发送回复
pub type CommandHandler =
    fn(String, Context, LockedWriter) -> BoxFuture<'static, Result<(), PluginError>>;

/// 指令描述符。新增指令只需在 command_table 中追加一项，分发器无需改动。
pub struct Command {
    /// 关键字（小写，注册表内唯一）
    pub name: &'static str,
    /// 一句话描述，用于 /help 列表
    pub description: &'static str,
    /// 用法说明，用于 /help 详解
    pub usage: &'static str,
    pub handler: CommandHandler,
    pub default_config: fn() -> Value,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("指令关键字重复注册: {0}")]
    DuplicateCommand(String),
}

static COMMANDS: OnceLock<Vec<Command>> = OnceLock::new();

/// 全局指令表
pub fn command_table() -> &'static [Command] {
    COMMANDS.get_or_init(|| {
        vec![
            Command {
                name: "map",
                description: "查询地图信息",
                usage: "/map <地图名称> - 查询地图图片；/map list - 查看所有地图",
                handler: map::handle,
                default_config: map::default_config,
            },
            Command {
                name: "weapon",
                description: "查询武器信息",
                usage: "/weapon <武器名称> [等级] - 查询武器（默认1级）；/weapon list - 查看所有武器",
                handler: weapon::handle,
                default_config: weapon::default_config,
            },
            Command {
                name: "arc",
                description: "查询ARC Raiders相关信息",
                usage: "/arc <关键词> - 查询资料图；/arc list - 查看所有信息",
                handler: arc::handle,
                default_config: arc::default_config,
            },
            Command {
                name: "help",
                description: "显示可用命令列表",
                usage: "/help - 显示本帮助信息",
                handler: help::handle,
                default_config: help::default_config,
            },
            Command {
                name: "reload",
                description: "重新加载资源索引",
                usage: "/reload - 重新读取资源文档，无需重启",
                handler: reload::handle,
                default_config: reload::default_config,
            },
        ]
    })
}

static LOOKUP: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();

fn build_lookup(commands: &[Command]) -> Result<HashMap<&'static str, usize>, RegistryError> {
    let mut lookup = HashMap::new();
    for (idx, cmd) in commands.iter().enumerate() {
        if lookup.insert(cmd.name, idx).is_some() {
            return Err(RegistryError::DuplicateCommand(cmd.name.to_string()));
        }
    }
    Ok(lookup)
}

/// 启动时构建关键字查找表。关键字重复属于编程错误，终止启动。
pub fn init() -> Result<(), RegistryError> {
    let commands = command_table();
    let lookup = build_lookup(commands)?;
    let _ = LOOKUP.set(lookup);
    info!(target: "System", "指令注册表就绪 ({} 个指令)", commands.len());
    Ok(())
}

fn find_command(keyword: &str) -> Option<&'static Command> {
    let lookup = LOOKUP.get()?;
    lookup.get(keyword).map(|&idx| &command_table()[idx])
}

/// 指令在配置中的启用状态，未配置时默认启用
pub fn command_enabled(ctx: &Context, name: &str) -> bool {
    let guard = ctx.config.read().unwrap();
    guard
        .plugins
        .get(name)
        .and_then(|v| v.get("enabled"))
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

/// 读取指令的专属配置表
pub fn get_config<T>(ctx: &Context, name: &str) -> Option<T>
where
    T: DeserializeOwned,
{
    let guard = ctx.config.read().unwrap();
    guard
        .plugins
        .get(name)
        .and_then(|v| T::deserialize(v.clone()).ok())
}

/// 把缺失的指令默认配置补进 AppConfig，返回是否有改动
pub fn ensure_default_configs(config: &mut crate::config::AppConfig) -> bool {
    let mut changed = false;
    for cmd in command_table() {
        if !config.plugins.contains_key(cmd.name) {
            config
                .plugins
                .insert(cmd.name.to_string(), (cmd.default_config)());
            changed = true;
        }
    }
    changed
}

/// 分发入口：解析首个 Token 并调用对应指令。
/// 未注册的关键字不做任何处理（保持群聊安静）；
/// 处理函数返回的错误在此处兜底，转换为一条失败回复。
pub async fn dispatch(ctx: Context, writer: LockedWriter) -> Result<(), PluginError> {
    let (group_id, user_id, sender, keyword, content) = {
        let Some(msg) = ctx.as_message() else {
            return Ok(());
        };

        let prefixes = ctx.prefixes();
        let Some(parsed) = parse_command(&prefixes, msg.text()) else {
            return Ok(());
        };

        (
            msg.group_id(),
            msg.user_id(),
            msg.sender_name().to_string(),
            parsed.keyword,
            parsed.content.to_string(),
        )
    };

    let Some(cmd) = find_command(&keyword) else {
        return Ok(());
    };
    if !command_enabled(&ctx, cmd.name) {
        return Ok(());
    }

    info!(
        target: "Dispatch",
        "[{}] {} ({}) 触发 /{} {}",
        ctx.bot.platform, sender, user_id, cmd.name, content
    );

    if let Err(e) = (cmd.handler)(content, ctx, writer.clone()).await {
        error!(target: "Plugin", "❌ [{}] 处理失败: {}", cmd.name, e);
        let reply = Message::new().text("❌ 查询失败，请稍后重试");
        send_msg(writer, group_id, Some(user_id), reply).await?;
    }

    Ok(())
}

// ================= 插件共用工具 =================

/// "查看完整列表" 关键字
pub fn is_list_query(query: &str) -> bool {
    matches!(query.to_lowercase().as_str(), "list" | "列表" | "全部")
}

/// 上传条目图片并回复。
/// 图片缺失或上传失败时降级为文字回复，绝不让请求无声失败。
pub async fn reply_with_asset(
    ctx: &Context,
    writer: LockedWriter,
    group_id: Option<i64>,
    user_id: i64,
    message_id: i64,
    category: Category,
    entry: &ResourceEntry,
    filename: &str,
) -> Result<(), PluginError> {
    let path = ctx.resources.asset_path(category, filename);

    if !path.exists() {
        let reply = Message::new()
            .reply(message_id)
            .text(format!("❌ [{}] 图片文件不存在", entry.name));
        return send_msg(writer, group_id, Some(user_id), reply).await;
    }

    match ctx.uploader.upload_path(&path).await {
        Ok(url) => {
            let reply = Message::new().reply(message_id).image(url);
            send_msg(writer, group_id, Some(user_id), reply).await
        }
        Err(e) => {
            error!(target: "Upload", "[{}] 上传失败: {}", entry.name, e);
            let reply = Message::new()
                .reply(message_id)
                .text(format!("⚠️ [{}] 图片上传失败，请稍后重试", entry.name));
            send_msg(writer, group_id, Some(user_id), reply).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler(
        _content: String,
        _ctx: Context,
        _writer: LockedWriter,
    ) -> BoxFuture<'static, Result<(), PluginError>> {
        Box::pin(async { Ok(()) })
    }

    fn empty_config() -> Value {
        Value::Table(Default::default())
    }

    #[test]
    fn builtin_table_has_no_duplicates() {
        assert!(build_lookup(command_table()).is_ok());
    }

    #[test]
    fn duplicate_keyword_is_rejected() {
        let commands = vec![
            Command {
                name: "dup",
                description: "a",
                usage: "",
                handler: noop_handler,
                default_config: empty_config,
            },
            Command {
                name: "dup",
                description: "b",
                usage: "",
                handler: noop_handler,
                default_config: empty_config,
            },
        ];
        assert!(matches!(
            build_lookup(&commands),
            Err(RegistryError::DuplicateCommand(name)) if name == "dup"
        ));
    }

    #[test]
    fn every_builtin_command_is_documented() {
        for cmd in command_table() {
            assert!(!cmd.description.is_empty(), "{} 缺少描述", cmd.name);
            assert!(!cmd.usage.is_empty(), "{} 缺少用法", cmd.name);
            assert_eq!(cmd.name, cmd.name.to_lowercase());
        }
    }

    #[test]
    fn list_keywords_match() {
        assert!(is_list_query("list"));
        assert!(is_list_query("LIST"));
        assert!(is_list_query("列表"));
        assert!(is_list_query("全部"));
        assert!(!is_list_query("listing"));
        assert!(!is_list_query("示例地图"));
    }

    #[test]
    fn ensure_defaults_fills_missing_tables() {
        let mut config = crate::config::AppConfig::default();
        assert!(ensure_default_configs(&mut config));
        for cmd in command_table() {
            assert!(config.plugins.contains_key(cmd.name));
        }
        // 第二次调用不再有改动
        assert!(!ensure_default_configs(&mut config));
    }

    // ================= 分发链路测试 =================

    use crate::config::{AppConfig, UploadConfig};
    use crate::event::{Event, EventType};
    use crate::matcher::Matcher;
    use crate::resources::Resources;
    use crate::uploader::Uploader;
    use futures_util::Sink;
    use simd_json::json;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex, RwLock};
    use std::task::{Context as TaskContext, Poll};
    use tokio::sync::Mutex as AsyncMutex;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

    /// 记录所有发出的帧，代替真实的 WebSocket 写入端
    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    impl Sink<WsMessage> for RecordingSink {
        type Error = WsError;

        fn poll_ready(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
            if let WsMessage::Text(text) = item {
                self.0.lock().unwrap().push(text.to_string());
            }
            Ok(())
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn message_event(text: &str) -> Event {
        json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": 1,
            "message_id": 100,
            "raw_message": text,
            "sender": {"nickname": "tester"}
        })
    }

    /// 基于默认资源文档构造完整上下文（图片文件不存在，回复降级为文字）
    async fn test_context(
        raw_message: &str,
    ) -> (Context, LockedWriter, Arc<Mutex<Vec<String>>>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let resources = Arc::new(Resources::load(tmp.path()).await.unwrap());

        let ctx = Context {
            event: EventType::Onebot(message_event(raw_message)),
            config: Arc::new(RwLock::new(AppConfig::default())),
            resources,
            uploader: Arc::new(Uploader::new(&UploadConfig::default())),
            matcher: Arc::new(Matcher::new()),
            bot: Default::default(),
        };

        let sent = Arc::new(Mutex::new(Vec::new()));
        let writer: LockedWriter =
            Arc::new(AsyncMutex::new(Box::new(RecordingSink(sent.clone()))));
        (ctx, writer, sent, tmp)
    }

    #[tokio::test]
    async fn dispatch_routes_weapon_command_with_level() {
        init().unwrap();
        let (ctx, writer, sent, _tmp) = test_context("/weapon 示例武器 2").await;
        dispatch(ctx, writer).await.unwrap();

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 1);
        // 默认文档含 2 级条目，但图片不在磁盘上，降级为文字回复
        assert!(frames[0].contains("示例武器"));
    }

    #[tokio::test]
    async fn dispatch_reports_missing_level() {
        init().unwrap();
        let (ctx, writer, sent, _tmp) = test_context("/weapon 示例武器 9").await;
        dispatch(ctx, writer).await.unwrap();

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("可用等级"));
    }

    #[tokio::test]
    async fn dispatch_replies_on_lookup_miss() {
        init().unwrap();
        let (ctx, writer, sent, _tmp) = test_context("/map 不存在的地图").await;
        dispatch(ctx, writer).await.unwrap();

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("未找到地图"));
    }

    #[tokio::test]
    async fn dispatch_ignores_unknown_and_plain_text() {
        init().unwrap();
        for raw in ["/nosuchcommand foo", "随便聊聊", "weapon 没有前缀"] {
            let (ctx, writer, sent, _tmp) = test_context(raw).await;
            dispatch(ctx, writer).await.unwrap();
            assert!(sent.lock().unwrap().is_empty(), "{:?} 不应产生回复", raw);
        }
    }

    #[tokio::test]
    async fn dispatch_skips_disabled_command() {
        init().unwrap();
        let (ctx, writer, sent, _tmp) = test_context("/help").await;
        {
            let mut guard = ctx.config.write().unwrap();
            let mut table = toml::Table::new();
            table.insert("enabled".to_string(), Value::Boolean(false));
            guard.plugins.insert("help".to_string(), Value::Table(table));
        }
        dispatch(ctx, writer).await.unwrap();
        assert!(sent.lock().unwrap().is_empty());
    }
}
