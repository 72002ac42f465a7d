//! 评分规则
//!
//! - 性能：5 分，加载时间超过 3000ms 扣 1 分
//! - SEO：5 分，缺少 title 扣 1 分，缺少 meta description 扣 1 分
//! - 移动端：有 viewport 设置 5 分，否则 3 分
//! - 无障碍：5 - floor(问题数 / 2)，最低 1 分
//! - 获客能力：分析器给出的分数，缺失（0）时按 3 分
//! - 总分为五项之和

use crate::models::{MobileFacts, PerformanceFacts, Scores, SeoFacts};

/// 加载时间阈值（毫秒）
pub const SLOW_LOAD_MS: u64 = 3000;

pub fn calculate_scores(
    performance: &PerformanceFacts,
    seo: &SeoFacts,
    mobile: &MobileFacts,
    violation_count: usize,
    lead_score: u8,
) -> Scores {
    let mut perf: i32 = 5;
    if performance.load_time > SLOW_LOAD_MS {
        perf -= 1;
    }

    let mut seo_score: i32 = 5;
    if seo.title.is_none() {
        seo_score -= 1;
    }
    if seo.meta_description.is_none() {
        seo_score -= 1;
    }

    let mobile_score: i32 = if mobile.viewport.is_some() { 5 } else { 3 };
    let a11y = (5 - (violation_count / 2).min(4) as i32).max(1);
    let lead = if lead_score == 0 { 3 } else { i32::from(lead_score.min(5)) };

    let perf = perf.max(1);
    let seo_score = seo_score.max(1);

    Scores {
        performance: perf as u8,
        seo: seo_score as u8,
        mobile: mobile_score as u8,
        accessibility: a11y as u8,
        b2b_lead: lead as u8,
        overall: (perf + seo_score + mobile_score + a11y + lead) as u8,
    }
}
