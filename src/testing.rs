//! 测试用的假渲染器
//!
//! 按脚本原文匹配返回值，不需要真实浏览器

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};

use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::{PageProbe, Renderer, RendererLauncher, Tab};
use crate::services::accessibility::BASIC_CHECK_SCRIPT;
use crate::services::lead::LEAD_SCRIPT;
use crate::services::mobile::MOBILE_SCRIPT;
use crate::services::performance::TIMING_SCRIPT;

/// 假页面：按脚本原文返回预设结果，未预设的脚本执行失败
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    html: String,
    responses: HashMap<String, JsonValue>,
}

impl FakeProbe {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            responses: HashMap::new(),
        }
    }

    pub fn respond(mut self, script: &str, value: JsonValue) -> Self {
        self.responses.insert(script.to_string(), value);
        self
    }

    /// 所有分析脚本都有正常返回的页面
    pub fn healthy_page() -> Self {
        Self::new(
            r#"<html lang="ja"><head>
<title>Acme 株式会社</title>
<meta name="description" content="B2B SaaS">
<meta name="viewport" content="width=device-width, initial-scale=1">
</head><body><h1>Acme</h1><img src="a.png" alt="logo"></body></html>"#,
        )
        .respond(
            TIMING_SCRIPT,
            json!({"domContentLoaded": 600, "loadComplete": 1200, "firstContentfulPaint": 300}),
        )
        .respond(
            MOBILE_SCRIPT,
            json!({
                "viewport": "width=device-width, initial-scale=1",
                "hasMediaQueries": true,
                "totalTargets": 10,
                "adequateTargets": 10,
                "smallTargets": 0
            }),
        )
        .respond(BASIC_CHECK_SCRIPT, json!([]))
        .respond(
            LEAD_SCRIPT,
            json!({
                "text": "お問い合わせ 会社概要",
                "formCount": 1,
                "links": [{"text": "料金", "href": "/pricing"}],
                "buttons": ["無料で試す"]
            }),
        )
    }
}

#[async_trait]
impl PageProbe for FakeProbe {
    async fn eval(&self, js_code: &str) -> AppResult<JsonValue> {
        self.responses.get(js_code).cloned().ok_or_else(|| {
            AppError::Browser(BrowserError::ScriptExecutionFailed {
                source: "脚本没有预设返回值".into(),
            })
        })
    }

    async fn content(&self) -> AppResult<String> {
        Ok(self.html.clone())
    }
}

/// 某个 URL 的导航表现
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    Loads(FakeProbe),
    /// 延迟后加载
    Slow(Duration, FakeProbe),
    /// 永不返回（由调用方的超时结束）
    Hangs,
    Fails,
    /// 导航时浏览器进程退出
    Crashes,
}

#[derive(Default)]
struct Shared {
    fail_launch: bool,
    default_page: Option<FakeProbe>,
    pages: HashMap<String, FakeBehavior>,
    launched: AtomicUsize,
    next_id: AtomicU64,
    shut_down: Mutex<HashSet<u64>>,
    dead: Mutex<HashSet<u64>>,
    tabs_opened: AtomicUsize,
    tabs_closed: AtomicUsize,
}

/// 假启动器
#[derive(Clone)]
pub struct FakeLauncher {
    shared: Arc<Shared>,
}

impl FakeLauncher {
    /// 所有 URL 都正常加载 `FakeProbe::healthy_page()`
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                default_page: Some(FakeProbe::healthy_page()),
                ..Default::default()
            }),
        }
    }

    /// 每次启动都失败
    pub fn failing() -> Self {
        Self {
            shared: Arc::new(Shared {
                fail_launch: true,
                ..Default::default()
            }),
        }
    }

    /// 指定某个 URL 的表现（需在启动前调用）
    pub fn with_page(mut self, url: &str, behavior: FakeBehavior) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.pages.insert(url.to_string(), behavior);
        }
        self
    }

    /// 模拟浏览器进程退出
    pub fn kill(&self, id: u64) {
        self.shared.dead.lock().insert(id);
    }

    pub fn launched(&self) -> usize {
        self.shared.launched.load(Ordering::SeqCst)
    }

    pub fn was_shut_down(&self, id: u64) -> bool {
        self.shared.shut_down.lock().contains(&id)
    }

    pub fn tabs_opened(&self) -> usize {
        self.shared.tabs_opened.load(Ordering::SeqCst)
    }

    pub fn tabs_closed(&self) -> usize {
        self.shared.tabs_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RendererLauncher for FakeLauncher {
    async fn launch(&self) -> AppResult<Arc<dyn Renderer>> {
        if self.shared.fail_launch {
            return Err(AppError::browser_startup_failed("chrome not found"));
        }
        self.shared.launched.fetch_add(1, Ordering::SeqCst);
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(FakeRenderer {
            id,
            shared: self.shared.clone(),
        }))
    }
}

pub struct FakeRenderer {
    id: u64,
    shared: Arc<Shared>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_alive(&self) -> bool {
        !self.shared.dead.lock().contains(&self.id)
            && !self.shared.shut_down.lock().contains(&self.id)
    }

    async fn new_tab(&self) -> AppResult<Box<dyn Tab>> {
        if !self.is_alive() {
            return Err(AppError::Browser(BrowserError::PageCreationFailed {
                source: "crashed".into(),
            }));
        }
        self.shared.tabs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTab {
            renderer_id: self.id,
            shared: self.shared.clone(),
            loaded: Mutex::new(None),
        }))
    }

    async fn shutdown(&self) -> AppResult<()> {
        self.shared.shut_down.lock().insert(self.id);
        Ok(())
    }
}

pub struct FakeTab {
    renderer_id: u64,
    shared: Arc<Shared>,
    loaded: Mutex<Option<FakeProbe>>,
}

impl FakeTab {
    fn page(&self) -> AppResult<FakeProbe> {
        self.loaded
            .lock()
            .clone()
            .ok_or_else(|| {
                AppError::Browser(BrowserError::TargetClosed {
                    reason: "页面未加载".to_string(),
                })
            })
    }
}

#[async_trait]
impl PageProbe for FakeTab {
    async fn eval(&self, js_code: &str) -> AppResult<JsonValue> {
        self.page()?.eval(js_code).await
    }

    async fn content(&self) -> AppResult<String> {
        self.page()?.content().await
    }
}

#[async_trait]
impl Tab for FakeTab {
    async fn goto(&self, url: &str) -> AppResult<()> {
        let behavior = self
            .shared
            .pages
            .get(url)
            .cloned()
            .or_else(|| self.shared.default_page.clone().map(FakeBehavior::Loads))
            .unwrap_or(FakeBehavior::Fails);

        let probe = match behavior {
            FakeBehavior::Loads(probe) => probe,
            FakeBehavior::Slow(delay, probe) => {
                tokio::time::sleep(delay).await;
                probe
            }
            FakeBehavior::Hangs => std::future::pending().await,
            FakeBehavior::Fails => {
                return Err(AppError::navigation_failed(url, "net::ERR_NAME_NOT_RESOLVED"))
            }
            FakeBehavior::Crashes => {
                self.shared.dead.lock().insert(self.renderer_id);
                return Err(AppError::Browser(BrowserError::TargetClosed {
                    reason: "浏览器进程已退出".to_string(),
                }));
            }
        };
        *self.loaded.lock() = Some(probe);
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.shared.tabs_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
