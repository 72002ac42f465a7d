//! HTTP 接口集成测试
//!
//! 使用假渲染器，不需要真实浏览器

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;

use site_analyzer::api::{self, AnalyzeResponse, HealthResponse};
use site_analyzer::error::BrowserError;
use site_analyzer::services::{AccessibilityAnalyzer, AxeLoader, HtmlReportWriter, NarrativeService};
use site_analyzer::{
    AppError, AppResult, BatchLimits, BatchProcessor, PageFlow, PageProbe, Renderer,
    RendererLauncher, RendererPool, SessionStore, Tab,
};

const PAGE: &str = r#"<html><head><title>Example Domain</title>
<meta name="viewport" content="width=device-width"></head>
<body><h1>Example</h1></body></html>"#;

/// 只能读取页面内容的标签页，所有脚本都执行失败
struct StaticTab;

#[async_trait]
impl PageProbe for StaticTab {
    async fn eval(&self, _js_code: &str) -> AppResult<JsonValue> {
        Err(AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: "scripts disabled".into(),
        }))
    }

    async fn content(&self) -> AppResult<String> {
        Ok(PAGE.to_string())
    }
}

#[async_trait]
impl Tab for StaticTab {
    async fn goto(&self, _url: &str) -> AppResult<()> {
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}

struct StaticRenderer;

#[async_trait]
impl Renderer for StaticRenderer {
    fn id(&self) -> u64 {
        1
    }

    fn is_alive(&self) -> bool {
        true
    }

    async fn new_tab(&self) -> AppResult<Box<dyn Tab>> {
        Ok(Box::new(StaticTab))
    }

    async fn shutdown(&self) -> AppResult<()> {
        Ok(())
    }
}

struct StaticLauncher;

#[async_trait]
impl RendererLauncher for StaticLauncher {
    async fn launch(&self) -> AppResult<Arc<dyn Renderer>> {
        Ok(Arc::new(StaticRenderer))
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
    reports: tempfile::TempDir,
}

async fn start_server() -> TestServer {
    let reports = tempfile::tempdir().unwrap();
    let flow = PageFlow::with_parts(
        Duration::from_secs(5),
        AccessibilityAnalyzer::new(AxeLoader::disabled()),
        NarrativeService::unconfigured(),
    );
    let processor = BatchProcessor::with_parts(
        Arc::new(RendererPool::new(Arc::new(StaticLauncher), 2)),
        Arc::new(SessionStore::new(Duration::from_secs(1800))),
        Arc::new(flow),
        Arc::new(HtmlReportWriter::new(reports.path())),
        BatchLimits {
            max_urls: 10,
            resolve_hostnames: false,
        },
    );

    let app = api::router(Arc::new(processor));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        reports,
    }
}

impl TestServer {
    async fn analyze(&self, urls: JsonValue) -> reqwest::Response {
        self.post_analyze(json!({ "urls": urls })).await
    }

    async fn post_analyze(&self, body: JsonValue) -> reqwest::Response {
        self.client
            .post(format!("{}/api/analyze", self.base))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn status(&self, id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/status/{}", self.base, id))
            .send()
            .await
            .unwrap()
    }

    fn report_count(&self, session_id: &str) -> usize {
        std::fs::read_dir(self.reports.path().join(session_id))
            .map(|dir| dir.count())
            .unwrap_or(0)
    }
}

#[tokio::test]
async fn test_health() {
    let server = start_server().await;
    let resp = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: HealthResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "ok");
    assert!(!body.narrative_configured);
}

#[tokio::test]
async fn test_validation_errors_return_400() {
    let server = start_server().await;

    let eleven: Vec<String> = (0..11).map(|i| format!("https://s{}.test/", i)).collect();
    let resp = server.analyze(json!(eleven)).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: JsonValue = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("11"));

    for url in ["http://127.0.0.1/", "http://192.168.1.5/", "http://10.0.0.1/", "ftp://a.test/"] {
        let resp = server.analyze(json!([url])).await;
        assert_eq!(resp.status().as_u16(), 400, "{}", url);
    }
}

#[tokio::test]
async fn test_malformed_body_returns_400_json() {
    let server = start_server().await;

    for body in [
        json!({}),
        json!({ "urls": "https://a.test/" }),
        json!({ "urls": null }),
        json!({ "urls": [1, 2] }),
    ] {
        let resp = server.post_analyze(body.clone()).await;
        assert_eq!(resp.status().as_u16(), 400, "{}", body);
        let error: JsonValue = resp.json().await.unwrap();
        assert!(error["error"].as_str().unwrap().contains("请求体无效"), "{}", body);
    }

    // 不是 JSON
    let resp = server
        .client
        .post(format!("{}/api/analyze", server.base))
        .header("content-type", "application/json")
        .body("urls=a")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let error: JsonValue = resp.json().await.unwrap();
    assert!(error["error"].is_string());
}

#[tokio::test]
async fn test_unknown_session_returns_404() {
    let server = start_server().await;
    assert_eq!(server.status("missing").await.status().as_u16(), 404);

    let resp = server
        .client
        .post(format!("{}/api/cancel/missing", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn test_analyze_until_completed() {
    let server = start_server().await;

    let resp = server
        .analyze(json!(["https://example.com/", "https://example.org/"]))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let AnalyzeResponse { session_id, .. } = resp.json().await.unwrap();

    let session: JsonValue = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let session: JsonValue = server.status(&session_id).await.json().await.unwrap();
            if session["status"] != "running" {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(session["status"], "completed");
    assert_eq!(session["progress"], 2);
    assert_eq!(session["total"], 2);
    let results = session["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["url"], "https://example.com/");
    assert_eq!(results[0]["seo"]["title"], "Example Domain");
    // 脚本全部失败：对应数据降级，但仍有评分
    assert_eq!(results[0]["performance"]["degraded"], true);
    assert!(results[0]["scores"]["overall"].as_u64().unwrap() >= 5);
    assert_eq!(results[0]["narrativeSource"], "fallback");

    // 报告在状态完成后写入
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.report_count(&session_id) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_cancel_known_session_is_accepted() {
    let server = start_server().await;
    let resp = server.analyze(json!(["https://example.com/"])).await;
    let AnalyzeResponse { session_id, .. } = resp.json().await.unwrap();

    let resp = server
        .client
        .post(format!("{}/api/cancel/{}", server.base, session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);
}
