//! 性能分析 - 业务能力层
//!
//! 读取 Navigation Timing / Paint Timing

use serde::Deserialize;

use crate::error::AppResult;
use crate::infrastructure::{eval_as, PageProbe};
use crate::models::PerformanceFacts;

pub(crate) const TIMING_SCRIPT: &str = r#"
(() => {
    const nav = performance.getEntriesByType('navigation')[0];
    const fcp = performance.getEntriesByType('paint')
        .find(e => e.name === 'first-contentful-paint');
    return {
        domContentLoaded: nav ? Math.round(nav.domContentLoadedEventEnd) : null,
        loadComplete: nav && nav.loadEventEnd > 0 ? Math.round(nav.loadEventEnd) : null,
        firstContentfulPaint: fcp ? Math.round(fcp.startTime) : null
    };
})()
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTiming {
    dom_content_loaded: Option<f64>,
    load_complete: Option<f64>,
    first_contentful_paint: Option<f64>,
}

/// 提取性能数据
///
/// # 参数
/// - `probe`: 已加载的页面
/// - `navigation_ms`: 实测导航耗时，浏览器没有 Navigation Timing 时作为加载时间
pub async fn analyze_performance<P>(probe: &P, navigation_ms: u64) -> AppResult<PerformanceFacts>
where
    P: PageProbe + ?Sized,
{
    let raw: RawTiming = eval_as(probe, "performance", TIMING_SCRIPT).await?;
    let to_ms = |v: Option<f64>| v.filter(|v| *v >= 0.0).map(|v| v.round() as u64);

    let load_complete = to_ms(raw.load_complete);
    Ok(PerformanceFacts {
        load_time: load_complete.unwrap_or(navigation_ms),
        dom_content_loaded: to_ms(raw.dom_content_loaded),
        load_complete,
        first_contentful_paint: to_ms(raw.first_contentful_paint),
        degraded: false,
    })
}
