//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是服务的核心，负责把一次请求的 URL 列表跑完。
//!
//! ## 核心功能
//!
//! 1. **提交**：校验 URL、创建会话、后台启动批次任务，立即返回会话ID
//! 2. **资源管理**：整个批次只租用一个浏览器实例，结束时归还
//! 3. **顺序处理**：逐个页面调用 `PageFlow`，结果按输入顺序追加
//! 4. **失败隔离**：单个页面失败记为 `PageError`，批次继续
//! 5. **取消**：每个页面开始前检查取消信号，导航和建议生成也会被打断
//! 6. **浏览器崩溃**：浏览器进程退出时整个批次以 error 结束，保留已收集的结果
//! 7. **报告**：批次结束后为每个成功的页面写一份报告
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个页面的细节
//! - **资源所有者**：唯一从池中租用浏览器的模块
//! - **向下委托**：委托 `PageFlow` 处理单个页面

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::validation::validate_urls;
use crate::browser::RendererPool;
use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError, SessionError};
use crate::infrastructure::RendererLauncher;
use crate::models::{PageEntry, PageError};
use crate::services::{HtmlReportWriter, ReportEmitter};
use crate::session::{next_session_id, Session, SessionHandle, SessionStore};
use crate::utils::logging::{log_batch_complete, log_batch_start, log_page_start};
use crate::workflow::{PageCtx, PageFlow};

/// 提交限制
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    pub max_urls: usize,
    pub resolve_hostnames: bool,
}

impl BatchLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_urls: config.max_urls_per_batch,
            resolve_hostnames: config.resolve_hostnames,
        }
    }
}

/// 批量处理器
pub struct BatchProcessor {
    pool: Arc<RendererPool>,
    store: Arc<SessionStore>,
    flow: Arc<PageFlow>,
    emitter: Arc<dyn ReportEmitter>,
    limits: BatchLimits,
}

impl BatchProcessor {
    /// 按配置组装
    pub fn new(config: &Config, launcher: Arc<dyn RendererLauncher>) -> Self {
        Self::with_parts(
            Arc::new(RendererPool::new(launcher, config.max_renderers)),
            Arc::new(SessionStore::new(config.session_ttl())),
            Arc::new(PageFlow::new(config)),
            Arc::new(HtmlReportWriter::new(&config.report_dir)),
            BatchLimits::from_config(config),
        )
    }

    pub fn with_parts(
        pool: Arc<RendererPool>,
        store: Arc<SessionStore>,
        flow: Arc<PageFlow>,
        emitter: Arc<dyn ReportEmitter>,
        limits: BatchLimits,
    ) -> Self {
        Self {
            pool,
            store,
            flow,
            emitter,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn narrative_configured(&self) -> bool {
        self.flow.narrative_configured()
    }

    /// 提交批次
    ///
    /// 校验失败时不会创建会话；成功时批次在后台运行，立即返回会话ID
    pub async fn submit(&self, urls: &[String]) -> AppResult<String> {
        let urls =
            validate_urls(urls, self.limits.max_urls, self.limits.resolve_hostnames).await?;

        let id = next_session_id();
        let handle = self.store.create(&id, urls.len());

        let pool = self.pool.clone();
        let flow = self.flow.clone();
        let emitter = self.emitter.clone();
        let supervisor = handle.clone();
        let task = tokio::spawn(run_batch(pool, flow, emitter, handle, urls));

        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!("[会话 {}] ❌ 批次任务异常退出: {}", supervisor.id(), e);
                supervisor.fail(format!("批次任务异常退出: {}", e));
            }
        });

        Ok(id)
    }

    /// 查询会话快照
    pub fn status(&self, session_id: &str) -> AppResult<Session> {
        self.store.get(session_id).ok_or_else(|| {
            SessionError::NotFound {
                id: session_id.to_string(),
            }
            .into()
        })
    }

    /// 取消批次（已结束的会话不受影响）
    pub fn cancel(&self, session_id: &str) -> AppResult<()> {
        if self.store.cancel(session_id) {
            info!("[会话 {}] 🛑 收到取消请求", session_id);
            Ok(())
        } else {
            Err(SessionError::NotFound {
                id: session_id.to_string(),
            }
            .into())
        }
    }

    /// 进程退出前调用：取消所有批次并关闭共享浏览器
    pub async fn shutdown(&self) {
        self.store.cancel_all();
        self.pool.shutdown().await;
    }
}

/// 批次结束方式
enum BatchOutcome {
    Completed,
    Cancelled,
    Aborted(String),
}

/// 运行一个批次（后台任务）
async fn run_batch(
    pool: Arc<RendererPool>,
    flow: Arc<PageFlow>,
    emitter: Arc<dyn ReportEmitter>,
    handle: SessionHandle,
    urls: Vec<String>,
) {
    let session_id = handle.id().to_string();
    let total = urls.len();
    log_batch_start(&session_id, total);

    let lease = match pool.acquire_guarded().await {
        Ok(lease) => lease,
        Err(e) => {
            error!("[会话 {}] ❌ 无法获取浏览器: {}", session_id, e);
            handle.fail(e.to_string());
            return;
        }
    };
    let renderer = lease.renderer().clone();
    let renderer_exited =
        || AppError::Browser(BrowserError::RendererExited { id: renderer.id() }).to_string();

    let cancel = handle.cancel_token().clone();
    let mut outcome = BatchOutcome::Completed;

    for (index, url) in urls.iter().enumerate() {
        if cancel.is_cancelled() {
            outcome = BatchOutcome::Cancelled;
            break;
        }
        if !renderer.is_alive() {
            outcome = BatchOutcome::Aborted(renderer_exited());
            break;
        }

        handle.begin_page(index, url);
        log_page_start(&session_id, index, total, url);

        let ctx = PageCtx::new(session_id.as_str(), index, total, url.as_str());
        match flow.run(renderer.as_ref(), &ctx, &cancel).await {
            Ok(result) => handle.push(PageEntry::Result(Box::new(result))),
            Err(AppError::Cancelled) => {
                outcome = BatchOutcome::Cancelled;
                break;
            }
            // 浏览器进程退出导致的失败不记为页面错误
            Err(e) if !renderer.is_alive() => {
                warn!("{} ❌ 浏览器进程已退出: {}", ctx, e);
                outcome = BatchOutcome::Aborted(renderer_exited());
                break;
            }
            Err(e) => {
                warn!("{} ❌ 页面分析失败: {}", ctx, e);
                handle.push(PageEntry::Error(PageError::from_error(url.as_str(), &e)));
            }
        }
    }

    // 独占实例用完即关，共享实例保持打开
    let close = !lease.is_shared();
    lease.release(close).await;

    match outcome {
        BatchOutcome::Completed => handle.complete(),
        BatchOutcome::Cancelled => {
            info!("[会话 {}] 🛑 批次已取消", session_id);
            handle.mark_cancelled();
        }
        BatchOutcome::Aborted(message) => {
            error!("[会话 {}] ❌ 批次中止: {}", session_id, message);
            handle.fail(message);
        }
    }

    let snapshot = handle.snapshot();
    log_batch_complete(&session_id, snapshot.success_count(), snapshot.error_count());

    emit_reports(emitter.as_ref(), &snapshot).await;
}

/// 为每个成功的页面写报告，失败只记录日志
async fn emit_reports(emitter: &dyn ReportEmitter, session: &Session) {
    for (index, entry) in session.results.iter().enumerate() {
        let Some(result) = entry.as_result() else {
            continue;
        };
        match emitter.emit(&session.id, index, result).await {
            Ok(path) => info!("[会话 {}] 📄 报告已生成: {}", session.id, path.display()),
            Err(e) => warn!("[会话 {}] ⚠️ 报告生成失败 {}: {}", session.id, result.url, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{ErrorKind, ValidationError};
    use crate::models::PageResult;
    use crate::services::{AccessibilityAnalyzer, AxeLoader, NarrativeService};
    use crate::session::SessionStatus;
    use crate::testing::{FakeBehavior, FakeLauncher, FakeProbe};

    #[derive(Default)]
    struct RecordingEmitter {
        emitted: Mutex<Vec<(String, usize, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReportEmitter for RecordingEmitter {
        async fn emit(
            &self,
            session_id: &str,
            index: usize,
            result: &PageResult,
        ) -> AppResult<PathBuf> {
            self.emitted
                .lock()
                .push((session_id.to_string(), index, result.url.clone()));
            if self.fail {
                return Err(AppError::Other("disk full".to_string()));
            }
            Ok(PathBuf::from(format!("{}.html", index)))
        }
    }

    fn processor(
        launcher: &FakeLauncher,
        navigation_timeout: Duration,
        emitter: Arc<RecordingEmitter>,
    ) -> BatchProcessor {
        let flow = PageFlow::with_parts(
            navigation_timeout,
            AccessibilityAnalyzer::new(AxeLoader::disabled()),
            NarrativeService::unconfigured(),
        );
        BatchProcessor::with_parts(
            Arc::new(RendererPool::new(Arc::new(launcher.clone()), 1)),
            Arc::new(SessionStore::new(Duration::from_secs(1800))),
            Arc::new(flow),
            emitter,
            BatchLimits {
                max_urls: 10,
                resolve_hostnames: false,
            },
        )
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn wait_terminal(processor: &BatchProcessor, id: &str) -> Session {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let session = processor.status(id).unwrap();
                if session.status.is_terminal() {
                    return session;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("批次未在期限内结束")
    }

    /// 报告在状态变为完成之后写入
    async fn wait_emitted(emitter: &RecordingEmitter, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while emitter.emitted.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("报告未在期限内写入")
    }

    #[tokio::test]
    async fn test_timeout_in_middle_is_isolated() {
        let _ = tracing_subscriber::fmt::try_init();
        let launcher = FakeLauncher::new().with_page("https://slow.test/", FakeBehavior::Hangs);
        let emitter = Arc::new(RecordingEmitter::default());
        let processor = processor(&launcher, Duration::from_millis(50), emitter.clone());

        let id = processor
            .submit(&urls(&["https://a.test/", "https://slow.test/", "https://c.test/"]))
            .await
            .unwrap();
        let session = wait_terminal(&processor, &id).await;

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 3);
        assert_eq!(session.results.len(), 3);
        assert!(session.results[0].as_result().is_some());
        assert!(session.results[2].as_result().is_some());
        match &session.results[1] {
            PageEntry::Error(e) => {
                assert_eq!(e.url, "https://slow.test/");
                assert_eq!(e.kind, ErrorKind::Timeout);
            }
            other => panic!("expected error entry, got {:?}", other),
        }

        // 只为成功的页面写报告
        wait_emitted(&emitter, 2).await;
        let emitted = emitter.emitted.lock().clone();
        let indexes: Vec<usize> = emitted.iter().map(|(_, i, _)| *i).collect();
        assert_eq!(indexes, vec![0, 2]);

        // 独占浏览器用完后关闭
        assert!(launcher.was_shut_down(1));
    }

    #[tokio::test]
    async fn test_renderer_crash_aborts_batch() {
        let launcher = FakeLauncher::new().with_page("https://b.test/", FakeBehavior::Crashes);
        let emitter = Arc::new(RecordingEmitter::default());
        let processor = processor(&launcher, Duration::from_secs(5), emitter.clone());

        let id = processor
            .submit(&urls(&["https://a.test/", "https://b.test/", "https://c.test/"]))
            .await
            .unwrap();
        let session = wait_terminal(&processor, &id).await;

        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.error.unwrap().contains("进程已退出"));
        // 崩溃前收集的结果保留，崩溃的页面不记为页面错误
        assert_eq!(session.results.len(), 1);
        assert!(session.results[0].as_result().is_some());
        assert_eq!(launcher.tabs_opened(), 2);

        wait_emitted(&emitter, 1).await;
        assert!(launcher.was_shut_down(1));
    }

    #[tokio::test]
    async fn test_dead_renderer_fails_batch_before_first_page() {
        let launcher = FakeLauncher::new();
        // 第一个启动的浏览器编号为 1
        launcher.kill(1);
        let processor = processor(
            &launcher,
            Duration::from_secs(5),
            Arc::new(RecordingEmitter::default()),
        );

        let id = processor
            .submit(&urls(&["https://a.test/", "https://b.test/"]))
            .await
            .unwrap();
        let session = wait_terminal(&processor, &id).await;

        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.results.is_empty());
        assert_eq!(launcher.tabs_opened(), 0);

        // 名额已归还，下一个批次启动新的浏览器
        let id = processor.submit(&urls(&["https://a.test/"])).await.unwrap();
        let session = wait_terminal(&processor, &id).await;
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(launcher.launched(), 2);
    }

    #[tokio::test]
    async fn test_degraded_mode_still_scores_every_page() {
        let launcher = FakeLauncher::new();
        let processor = processor(
            &launcher,
            Duration::from_secs(5),
            Arc::new(RecordingEmitter::default()),
        );

        let id = processor
            .submit(&urls(&["https://a.test/", "https://b.test/"]))
            .await
            .unwrap();
        let session = wait_terminal(&processor, &id).await;

        for entry in &session.results {
            let result = entry.as_result().unwrap();
            assert_eq!(result.lead.score, 3);
            assert!(result.lead.message.is_some());
            assert!((5..=25).contains(&result.scores.overall));
        }
    }

    #[tokio::test]
    async fn test_startup_failure_marks_session_error() {
        let launcher = FakeLauncher::failing();
        let emitter = Arc::new(RecordingEmitter::default());
        let processor = processor(&launcher, Duration::from_secs(5), emitter.clone());

        let id = processor.submit(&urls(&["https://a.test/"])).await.unwrap();
        let session = wait_terminal(&processor, &id).await;

        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.error.unwrap().contains("启动浏览器失败"));
        assert!(session.results.is_empty());
        assert!(emitter.emitted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_initial_snapshot_and_cancel() {
        let launcher = FakeLauncher::new().with_page("https://slow.test/", FakeBehavior::Hangs);
        let processor = processor(
            &launcher,
            Duration::from_secs(30),
            Arc::new(RecordingEmitter::default()),
        );

        let id = processor
            .submit(&urls(&["https://slow.test/", "https://b.test/"]))
            .await
            .unwrap();

        let session = processor.status(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.progress, 0);
        assert_eq!(session.total, 2);
        assert!(session.results.is_empty());

        // 等第一个页面开始导航后再取消
        tokio::time::timeout(Duration::from_secs(5), async {
            while processor.status(&id).unwrap().current_url.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        processor.cancel(&id).unwrap();
        let session = wait_terminal(&processor, &id).await;
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert!(session.results.is_empty());
        assert_eq!(launcher.tabs_opened(), 1);
        assert_eq!(launcher.tabs_closed(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let slow = |p: FakeProbe| FakeBehavior::Slow(Duration::from_millis(30), p);
        let launcher = FakeLauncher::new()
            .with_page("https://a.test/", slow(FakeProbe::healthy_page()))
            .with_page("https://b.test/", slow(FakeProbe::healthy_page()))
            .with_page("https://c.test/", slow(FakeProbe::healthy_page()));
        let processor = processor(
            &launcher,
            Duration::from_secs(5),
            Arc::new(RecordingEmitter::default()),
        );

        let id = processor
            .submit(&urls(&["https://a.test/", "https://b.test/", "https://c.test/"]))
            .await
            .unwrap();

        let mut last_progress = 0;
        let mut last_len = 0;
        loop {
            let session = processor.status(&id).unwrap();
            assert!(session.progress >= last_progress);
            assert!(session.results.len() >= last_len);
            if session.status == SessionStatus::Running {
                assert!(session.results.len() <= session.progress + 1);
                assert!(session.progress < session.total);
            }
            last_progress = session.progress;
            last_len = session.results.len();
            if session.status.is_terminal() {
                assert_eq!(session.progress, 3);
                assert_eq!(session.results.len(), 3);
                break;
            }
            tokio::time::sleep(Duration::from_millis(3)).await;
        }
    }

    #[tokio::test]
    async fn test_report_failure_does_not_change_status() {
        let launcher = FakeLauncher::new();
        let emitter = Arc::new(RecordingEmitter {
            fail: true,
            ..Default::default()
        });
        let processor = processor(&launcher, Duration::from_secs(5), emitter.clone());

        let id = processor.submit(&urls(&["https://a.test/"])).await.unwrap();
        let session = wait_terminal(&processor, &id).await;
        assert_eq!(session.status, SessionStatus::Completed);

        wait_emitted(&emitter, 1).await;
        assert_eq!(processor.status(&id).unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_invalid_submission_creates_no_session() {
        let launcher = FakeLauncher::new();
        let processor = processor(
            &launcher,
            Duration::from_secs(5),
            Arc::new(RecordingEmitter::default()),
        );

        let eleven: Vec<String> = (0..11).map(|i| format!("https://s{}.test/", i)).collect();
        let err = processor.submit(&eleven).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::TooManyUrls { .. })
        ));

        let err = processor
            .submit(&urls(&["https://a.test/", "http://192.168.1.5/"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(processor.store().is_empty());
        assert_eq!(launcher.launched(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let launcher = FakeLauncher::new();
        let processor = processor(
            &launcher,
            Duration::from_secs(5),
            Arc::new(RecordingEmitter::default()),
        );
        assert!(matches!(
            processor.status("nope"),
            Err(AppError::Session(SessionError::NotFound { .. }))
        ));
        assert!(processor.cancel("nope").is_err());
    }
}
