use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::fs;
use toml::Value;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // 全局指令前缀（支持多个，如 ["/", "#"]）
    #[serde(default = "default_prefix")]
    pub command_prefix: Vec<String>,

    // 资源索引与图片文件所在目录
    #[serde(default = "default_resource_dir")]
    pub resource_dir: String,

    // 是否输出调试日志
    #[serde(default)]
    pub debug: bool,

    // 图床上传配置
    #[serde(default)]
    pub upload: UploadConfig,

    // Bot 连接配置
    #[serde(default = "default_bots")]
    pub bots: Vec<BotConfig>,

    // 插件配置
    #[serde(flatten)]
    pub plugins: HashMap<String, Value>,
}

impl AppConfig {
    pub async fn save(&self, path: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).await?;
        Ok(())
    }
}

fn default_prefix() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_resource_dir() -> String {
    "resources".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadConfig {
    // 图床接口地址，Base64 上传
    #[serde(default = "default_upload_url")]
    pub api_url: String,

    // 请求超时（秒）
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,

    // 单张图片大小上限（MB）
    #[serde(default = "default_upload_max_mb")]
    pub max_size_mb: u64,
}

fn default_upload_url() -> String {
    "https://uapis.cn/api/v1/image/frombase64".to_string()
}

fn default_upload_timeout() -> u64 {
    30
}

fn default_upload_max_mb() -> u64 {
    10
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_url: default_upload_url(),
            timeout_secs: default_upload_timeout(),
            max_size_mb: default_upload_max_mb(),
        }
    }
}

fn default_bots() -> Vec<BotConfig> {
    vec![
        // 控制台适配器：本地命令测试工具，仅需启用
        BotConfig {
            enabled: true,
            protocol: "console".to_string(),
            url: None,
            access_token: None,
        },
        // OneBot 适配器：生成配置占位符，默认禁用以防误连
        BotConfig {
            enabled: false,
            protocol: "onebot".to_string(),
            url: Some("ws://127.0.0.1:3001".to_string()),
            access_token: Some("YOUR_TOKEN_HERE".to_string()),
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BotConfig {
    // 是否启用此 Bot
    #[serde(default = "default_true")]
    pub enabled: bool,

    // 协议类型 (例如 "onebot")
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    "onebot".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
            resource_dir: default_resource_dir(),
            debug: false,
            upload: UploadConfig::default(),
            bots: default_bots(),
            plugins: HashMap::new(),
        }
    }
}

/// 辅助函数：构建默认配置 Value，并确保包含 enabled 字段
pub fn build_config<T: Serialize>(data: T) -> Value {
    let mut val = Value::try_from(data).unwrap_or(Value::Table(Default::default()));
    if let Value::Table(ref mut map) = val
        && !map.contains_key("enabled")
    {
        map.insert("enabled".to_string(), Value::Boolean(true));
    }
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_console_and_onebot_slots() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.command_prefix, vec!["/".to_string()]);
        assert_eq!(cfg.resource_dir, "resources");
        assert_eq!(cfg.bots.len(), 2);
        assert!(cfg.bots[0].enabled);
        assert_eq!(cfg.bots[0].protocol, "console");
        assert!(!cfg.bots[1].enabled);
        assert_eq!(cfg.bots[1].protocol, "onebot");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: AppConfig = toml::from_str("debug = true\n").unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.upload.api_url, default_upload_url());
        assert_eq!(cfg.upload.timeout_secs, 30);
        assert_eq!(cfg.upload.max_size_mb, 10);
    }

    #[test]
    fn build_config_injects_enabled_flag() {
        #[derive(Serialize)]
        struct Empty {}
        let val = build_config(Empty {});
        assert_eq!(val.get("enabled"), Some(&Value::Boolean(true)));
    }
}
