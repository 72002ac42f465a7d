use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::{JsExecutor, Renderer, RendererLauncher, Tab};

static NEXT_RENDERER_ID: AtomicU64 = AtomicU64::new(1);

/// 无头浏览器启动参数
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub chrome_executable: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl LaunchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chrome_executable: config.chrome_executable.as_ref().map(PathBuf::from),
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
        }
    }
}

/// chromiumoxide 无头浏览器启动器
pub struct ChromiumLauncher {
    settings: LaunchSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> AppResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .window_size(self.settings.viewport_width, self.settings.viewport_height)
            .viewport(Viewport {
                width: self.settings.viewport_width,
                height: self.settings.viewport_height,
                ..Viewport::default()
            })
            // 安全取舍：容器内没有创建命名空间的权限，只能关闭操作系统级沙盒。
            // 被分析的页面因此只剩浏览器进程本身的隔离，须配合入口处的内网地址拦截使用。
            .args(vec![
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage", // 防止共享内存不足
            ]);

        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            AppError::browser_startup_failed(e)
        })
    }
}

#[async_trait]
impl RendererLauncher for ChromiumLauncher {
    /// 启动无头浏览器
    async fn launch(&self) -> AppResult<Arc<dyn Renderer>> {
        let id = NEXT_RENDERER_ID.fetch_add(1, Ordering::Relaxed);
        info!("🚀 启动无头浏览器 #{}...", id);

        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            AppError::browser_startup_failed(e)
        })?;
        debug!("无头浏览器 #{} 启动成功", id);

        // 在后台处理浏览器事件，事件流结束说明进程已退出
        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = alive.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
            warn!("浏览器 #{} 事件流已结束", id);
        });

        // 添加短暂延迟以等待浏览器状态同步
        sleep(tokio::time::Duration::from_millis(300)).await;

        Ok(Arc::new(ChromiumRenderer {
            id,
            browser: Mutex::new(Some(browser)),
            alive,
            handler_task,
        }))
    }
}

/// 一个 chromiumoxide 浏览器进程
pub struct ChromiumRenderer {
    id: u64,
    browser: Mutex<Option<Browser>>,
    alive: Arc<AtomicBool>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn new_tab(&self) -> AppResult<Box<dyn Tab>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or_else(|| {
            AppError::Browser(BrowserError::TargetClosed {
                reason: format!("浏览器 #{} 已关闭", self.id),
            })
        })?;

        let page = browser.new_page("about:blank").await.map_err(|e| {
            error!("创建新页面失败: {}", e);
            AppError::Browser(BrowserError::PageCreationFailed {
                source: Box::new(e),
            })
        })?;

        Ok(Box::new(JsExecutor::new(page)))
    }

    async fn shutdown(&self) -> AppResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        self.alive.store(false, Ordering::SeqCst);

        if let Err(e) = browser.close().await {
            warn!("关闭浏览器 #{} 失败: {}", self.id, e);
        }
        if let Err(e) = browser.wait().await {
            warn!("等待浏览器 #{} 退出失败: {}", self.id, e);
        }
        self.handler_task.abort();
        info!("🛑 浏览器 #{} 已关闭", self.id);
        Ok(())
    }
}
