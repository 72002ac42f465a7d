//! 页面处理流程 - 流程层
//!
//! 核心职责：定义"一个页面"的完整分析流程
//!
//! 流程顺序：
//! 1. 新建标签页并导航（受超时和取消信号约束）
//! 2. 并发执行：性能、页面内容、移动端、无障碍
//! 3. SEO（基于页面内容）→ 获客能力 → 评分
//! 4. 改进建议（可选，失败时降级）
//!
//! 单个分析器失败只会把对应数据标记为降级；
//! 导航失败、超时、页面关闭、批次取消才会让整个页面失败。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::{Renderer, Tab};
use crate::models::{
    AccessibilityFacts, LeadFacts, MobileFacts, PageResult, PerformanceFacts, SeoFacts,
};
use crate::services::{
    analyze_lead, analyze_mobile, analyze_performance, calculate_scores, extract_seo,
    AccessibilityAnalyzer, AxeLoader, NarrativeInput, NarrativeService,
};
use crate::workflow::page_ctx::PageCtx;

/// 页面处理流程
///
/// - 编排单个页面的完整分析流程
/// - 不持有浏览器，只借用调用方租到的实例
/// - 只依赖业务能力（services）
pub struct PageFlow {
    navigation_timeout: Duration,
    accessibility: AccessibilityAnalyzer,
    narrative: NarrativeService,
}

impl PageFlow {
    pub fn new(config: &Config) -> Self {
        let loader = AxeLoader::new(
            config.axe_sources.clone(),
            Duration::from_secs(config.axe_fetch_timeout_secs),
        );
        Self::with_parts(
            config.navigation_timeout(),
            AccessibilityAnalyzer::new(loader),
            NarrativeService::new(config),
        )
    }

    pub fn with_parts(
        navigation_timeout: Duration,
        accessibility: AccessibilityAnalyzer,
        narrative: NarrativeService,
    ) -> Self {
        Self {
            navigation_timeout,
            accessibility,
            narrative,
        }
    }

    pub fn narrative_configured(&self) -> bool {
        self.narrative.is_configured()
    }

    /// 分析单个页面
    ///
    /// 标签页在所有路径上都会被关闭
    pub async fn run(
        &self,
        renderer: &dyn Renderer,
        ctx: &PageCtx,
        cancel: &CancellationToken,
    ) -> AppResult<PageResult> {
        let mut tab = TabGuard::new(renderer.new_tab().await?);
        let result = self.analyze(tab.tab.as_ref(), ctx, cancel).await;
        tab.close(ctx).await;
        result
    }

    async fn analyze(
        &self,
        tab: &dyn Tab,
        ctx: &PageCtx,
        cancel: &CancellationToken,
    ) -> AppResult<PageResult> {
        // ========== 1. 导航 ==========
        let navigation_ms = self.navigate(tab, ctx, cancel).await?;
        info!("{} ✓ 页面加载完成 ({}ms)", ctx, navigation_ms);

        // ========== 2. 并发分析 ==========
        let (performance, content, mobile, accessibility) = tokio::join!(
            analyze_performance(tab, navigation_ms),
            tab.content(),
            analyze_mobile(tab),
            self.accessibility.analyze(tab),
        );

        let performance = or_degraded(ctx, "性能", performance, || {
            PerformanceFacts::degraded(navigation_ms)
        })?;
        let seo = or_degraded(
            ctx,
            "SEO",
            content.map(|html| extract_seo(&html)),
            SeoFacts::degraded,
        )?;
        let mobile = or_degraded(ctx, "移动端", mobile, MobileFacts::degraded)?;
        let accessibility =
            or_degraded(ctx, "无障碍", accessibility, AccessibilityFacts::degraded)?;

        // ========== 3. 获客能力与评分 ==========
        let lead = or_degraded(
            ctx,
            "获客能力",
            analyze_lead(tab, self.narrative.is_configured()).await,
            || LeadFacts::placeholder("获客能力分析失败，按默认 3 分计"),
        )?;

        let scores = calculate_scores(
            &performance,
            &seo,
            &mobile,
            accessibility.violation_count(),
            lead.score,
        );
        debug!("{} 评分: {:?}", ctx, scores);

        // ========== 4. 改进建议 ==========
        let narrative = self
            .narrative
            .generate(
                &NarrativeInput {
                    url: &ctx.url,
                    title: seo.title.as_deref(),
                    scores: &scores,
                    performance: &performance,
                    seo: &seo,
                    mobile: &mobile,
                    accessibility: &accessibility,
                    lead: &lead,
                },
                cancel,
            )
            .await;

        info!(
            "{} ✅ 分析完成: {}/25 ({}%)",
            ctx,
            scores.overall,
            scores.percentage()
        );

        Ok(PageResult {
            url: ctx.url.clone(),
            scores,
            performance,
            seo,
            mobile,
            accessibility,
            lead,
            suggestions: narrative.html,
            narrative_source: narrative.source,
        })
    }

    /// 导航到目标地址，返回耗时（毫秒）
    async fn navigate(
        &self,
        tab: &dyn Tab,
        ctx: &PageCtx,
        cancel: &CancellationToken,
    ) -> AppResult<u64> {
        info!("{} 🌐 正在打开: {}", ctx, ctx.url);
        let started = Instant::now();

        tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            r = tokio::time::timeout(self.navigation_timeout, tab.goto(&ctx.url)) => match r {
                Ok(r) => r?,
                Err(_) => {
                    return Err(BrowserError::NavigationTimeout {
                        url: ctx.url.clone(),
                        timeout_secs: self.navigation_timeout.as_secs(),
                    }
                    .into())
                }
            },
        }

        Ok(started.elapsed().as_millis() as u64)
    }
}

/// 标签页守卫：`run` 的 future 被丢弃时在后台关闭标签页
struct TabGuard {
    tab: Arc<dyn Tab>,
    closed: bool,
}

impl TabGuard {
    fn new(tab: Box<dyn Tab>) -> Self {
        Self {
            tab: Arc::from(tab),
            closed: false,
        }
    }

    async fn close(&mut self, ctx: &PageCtx) {
        self.closed = true;
        if let Err(e) = self.tab.close().await {
            warn!("{} 关闭标签页失败: {}", ctx, e);
        }
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let tab = self.tab.clone();
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = tab.close().await {
                    debug!("后台关闭标签页失败: {}", e);
                }
            });
        }
    }
}

/// 分析器失败时换成降级数据；导航级错误继续向上传递
fn or_degraded<T>(
    ctx: &PageCtx,
    analyzer: &str,
    result: AppResult<T>,
    fallback: impl FnOnce() -> T,
) -> AppResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_navigation_level() => Err(e),
        Err(e) => {
            warn!("{} ⚠️ {}分析失败，标记为降级: {}", ctx, analyzer, e);
            Ok(fallback())
        }
    }
}
