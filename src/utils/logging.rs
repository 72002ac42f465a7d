/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则默认 info，`verbose` 时为 debug
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("site_analyzer={},info", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `port`: 服务端口
/// - `max_renderers`: 浏览器实例上限
/// - `narrative_configured`: 是否配置了文本生成服务
pub fn log_startup(port: u16, max_renderers: usize, narrative_configured: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 网页分析服务启动: http://0.0.0.0:{}", port);
    info!("📊 浏览器实例上限: {}", max_renderers);
    info!(
        "🔑 文本生成服务: {}",
        if narrative_configured {
            "已配置"
        } else {
            "未配置（仅基础分析）"
        }
    );
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
pub fn log_batch_start(session_id: &str, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 [会话 {}] 开始分析，共 {} 个页面", session_id, total);
    info!("{}", "=".repeat(60));
}

/// 记录单页开始信息
pub fn log_page_start(session_id: &str, index: usize, total: usize, url: &str) {
    info!("\n[会话 {}] {}", session_id, "─".repeat(30));
    info!(
        "🔍 [会话 {}] [{}/{}] 分析中: {}",
        session_id,
        index + 1,
        total,
        truncate_text(url, 120)
    );
}

/// 记录批次完成信息
///
/// # 参数
/// - `session_id`: 会话 ID
/// - `success`: 成功数量
/// - `failed`: 失败数量
pub fn log_batch_complete(session_id: &str, success: usize, failed: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ [会话 {}] 分析完成: 成功 {}/{}，失败 {}",
        session_id,
        success,
        success + failed,
        failed
    );
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
