//! 移动端适配分析 - 业务能力层
//!
//! viewport 设置、媒体查询、触控目标尺寸（最小 44x44 px）

use serde::Deserialize;

use crate::error::AppResult;
use crate::infrastructure::{eval_as, PageProbe};
use crate::models::{MobileFacts, TouchTargets};

/// 推荐的最小触控目标边长（px）
pub const MIN_TOUCH_TARGET_PX: u32 = 44;

pub(crate) const MOBILE_SCRIPT: &str = r#"
(() => {
    const meta = document.querySelector('meta[name="viewport"]');
    const viewport = meta ? meta.getAttribute('content') : null;

    let hasMediaQueries = false;
    for (const sheet of Array.from(document.styleSheets)) {
        if (sheet.media && sheet.media.length > 0 && sheet.media.mediaText !== 'all') {
            hasMediaQueries = true;
            break;
        }
        try {
            if (Array.from(sheet.cssRules || []).some(r => r.type === CSSRule.MEDIA_RULE)) {
                hasMediaQueries = true;
                break;
            }
        } catch (e) {
            // 跨域样式表无法读取规则
        }
    }

    const minSize = 44;
    let totalTargets = 0;
    let adequateTargets = 0;
    let smallTargets = 0;
    document.querySelectorAll(
        'button, a[href], input, select, textarea, [role="button"], [tabindex="0"]'
    ).forEach(el => {
        const rect = el.getBoundingClientRect();
        if (rect.width > 0 && rect.height > 0) {
            totalTargets++;
            if (rect.width >= minSize && rect.height >= minSize) {
                adequateTargets++;
            } else {
                smallTargets++;
            }
        }
    });

    return { viewport, hasMediaQueries, totalTargets, adequateTargets, smallTargets };
})()
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMobile {
    viewport: Option<String>,
    #[serde(default)]
    has_media_queries: bool,
    total_targets: usize,
    adequate_targets: usize,
    small_targets: usize,
}

/// 提取移动端适配数据
pub async fn analyze_mobile<P>(probe: &P) -> AppResult<MobileFacts>
where
    P: PageProbe + ?Sized,
{
    let raw: RawMobile = eval_as(probe, "mobile", MOBILE_SCRIPT).await?;

    Ok(MobileFacts {
        viewport: raw.viewport.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
        has_media_queries: raw.has_media_queries,
        touch_targets: TouchTargets {
            total_targets: raw.total_targets,
            adequate_targets: raw.adequate_targets,
            small_targets: raw.small_targets,
        },
        degraded: false,
    })
}
