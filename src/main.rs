use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use swarm_core::{config::AppConfig, logging::init_logging};
use tracing::{error, info, warn};

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::{wait_for_shutdown_signal, ShutdownManager};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("swarm")
        .version("1.0.0")
        .about("卡牌分析内容分布式生成调度系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时依次查找 config/swarm.toml 与 swarm.toml"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["server", "worker", "all"])
                .default_value("server"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("Worker ID (覆盖配置与自动生成的ID)"),
        )
        .arg(
            Arg::new("dispatcher-url")
                .long("dispatcher-url")
                .value_name("URL")
                .help("调度中心地址 (仅Worker使用)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.unwrap_or("<默认路径>")))?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }
    init_logging(&config.observability.log_level, &config.observability.log_format)?;

    if let Some(id) = matches.get_one::<String>("worker-id") {
        config.worker.worker_id = Some(id.clone());
    }
    if let Some(url) = matches.get_one::<String>("dispatcher-url") {
        config.worker.dispatcher_url = url.clone();
    }

    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("server");
    let mode = AppMode::parse(mode_str)?;

    info!("启动卡牌分析调度系统");
    info!("运行模式: {mode_str}");

    let app = Application::new(config, mode).await?;
    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;

    let mut app_handle = tokio::spawn(async move { app.run(shutdown_rx).await });

    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
        }
        result = &mut app_handle => {
            // 组件提前退出（例如端口绑定失败），不再等待信号
            shutdown_manager.shutdown().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("应用运行失败: {e:#}");
                    Err(e)
                }
                Err(e) => Err(anyhow::anyhow!("应用任务异常退出: {e}")),
            };
        }
    }

    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用关闭时发生错误: {e:#}"),
        Ok(Err(e)) => error!("应用任务异常退出: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("卡牌分析调度系统已退出");
    Ok(())
}
