mod adapters;
mod command;
mod config;
mod event;
mod log;
mod matcher;
mod message;
mod plugins;
mod resources;
mod uploader;

use anyhow::Context as _;
use config::AppConfig;
use resources::Resources;
use std::sync::{Arc, RwLock};
use uploader::Uploader;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::print_banner();

    // 读取配置，首次启动时生成默认文件
    let mut app_config = match tokio::fs::read_to_string(CONFIG_PATH).await {
        Ok(content) => toml::from_str::<AppConfig>(&content).context("解析 config.toml 失败")?,
        Err(_) => {
            let default = AppConfig::default();
            default
                .save(CONFIG_PATH)
                .await
                .map_err(|e| anyhow::anyhow!("写入默认配置失败: {}", e))?;
            info!(target: "System", "已生成默认配置: {}", CONFIG_PATH);
            default
        }
    };

    log::set_debug(app_config.debug);

    // 加载资源索引（启动阶段解析失败视为致命错误）
    let resources = Arc::new(
        Resources::load(app_config.resource_dir.clone())
            .await
            .context("资源索引加载失败")?,
    );
    let uploader = Arc::new(Uploader::new(&app_config.upload));

    // 构建指令注册表（关键字重复视为编程错误，立即终止）
    plugins::init().context("指令注册失败")?;

    // 补全配置中缺失的指令默认项并回写
    if plugins::ensure_default_configs(&mut app_config)
        && let Err(e) = app_config.save(CONFIG_PATH).await
    {
        warn!(target: "System", "回写指令默认配置失败: {}", e);
    }

    let bots = app_config.bots.clone();
    let global_config = Arc::new(RwLock::new(app_config));

    // 启动所有已启用的 Bot 连接
    let mut started = 0usize;
    for bot in bots.into_iter().filter(|b| b.enabled) {
        match adapters::find_adapter(&bot.protocol) {
            Some(adapter) => {
                info!(target: "System", "启动适配器: {}", adapter.protocol);
                tokio::spawn((adapter.handler)(
                    bot,
                    global_config.clone(),
                    resources.clone(),
                    uploader.clone(),
                ));
                started += 1;
            }
            None => {
                warn!(target: "System", "未知协议 {:?}，跳过该 Bot", bot.protocol);
            }
        }
    }

    if started == 0 {
        warn!(target: "System", "没有启用任何 Bot 连接，请检查 config.toml");
    }

    tokio::signal::ctrl_c().await?;
    info!(target: "System", "收到退出信号，正在关闭...");
    Ok(())
}
