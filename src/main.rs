use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use site_analyzer::api;
use site_analyzer::utils::logging;
use site_analyzer::{BatchProcessor, ChromiumLauncher, Config, LaunchSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(
        config.server_port,
        config.max_renderers,
        config.narrative_configured(),
    );

    let launcher = Arc::new(ChromiumLauncher::new(LaunchSettings::from_config(&config)));
    let processor = Arc::new(BatchProcessor::new(&config, launcher));

    // 后台清理过期会话
    let shutdown = CancellationToken::new();
    let sweeper = processor
        .store()
        .spawn_sweeper(config.sweep_interval(), shutdown.clone());

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;
    info!("✅ 服务已就绪: http://{}", addr);

    let app = api::router(processor.clone());
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("监听退出信号失败: {}", e);
            }
            info!("🛑 收到退出信号，正在关闭...");
            signal.cancel();
        })
        .await
        .context("HTTP 服务异常退出")?;

    shutdown.cancel();
    processor.shutdown().await;
    let _ = sweeper.await;
    info!("👋 服务已关闭");

    Ok(())
}
