//! 各分析器产出的原始数据
//!
//! 每种数据都带有 `degraded` 标记：`true` 表示"没能检查"，
//! 与"检查过且没有问题"区分开。

use serde::{Deserialize, Serialize};

/// 性能数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceFacts {
    /// 页面加载耗时（毫秒）
    pub load_time: u64,
    pub dom_content_loaded: Option<u64>,
    pub load_complete: Option<u64>,
    pub first_contentful_paint: Option<u64>,
    pub degraded: bool,
}

impl PerformanceFacts {
    /// 只有导航耗时可用时的降级结果
    pub fn degraded(navigation_ms: u64) -> Self {
        Self {
            load_time: navigation_ms,
            degraded: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCounts {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCounts {
    pub total: usize,
    pub with_alt: usize,
    pub without_alt: usize,
}

/// SEO 数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoFacts {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headings: HeadingCounts,
    pub images: ImageCounts,
    pub degraded: bool,
}

impl SeoFacts {
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchTargets {
    pub total_targets: usize,
    pub adequate_targets: usize,
    pub small_targets: usize,
}

/// 移动端适配数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileFacts {
    /// viewport meta 的 content
    pub viewport: Option<String>,
    pub has_media_queries: bool,
    pub touch_targets: TouchTargets,
    pub degraded: bool,
}

impl MobileFacts {
    pub fn degraded() -> Self {
        Self {
            degraded: true,
            ..Default::default()
        }
    }
}

/// 实际使用的无障碍检查引擎
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessibilityEngine {
    /// 外部规则引擎（axe-core）
    Axe,
    /// 本地基础检查
    Basic,
    /// 两者都失败
    #[default]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub help: String,
    pub impact: Option<String>,
    pub description: String,
    /// 涉及的节点数
    pub nodes: usize,
}

/// 无障碍数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityFacts {
    pub engine: AccessibilityEngine,
    pub violations: Vec<Violation>,
    pub degraded: bool,
}

impl AccessibilityFacts {
    pub fn degraded() -> Self {
        Self {
            engine: AccessibilityEngine::Unavailable,
            violations: Vec::new(),
            degraded: true,
        }
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }
}

/// 获客能力数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFacts {
    /// 1-5
    pub score: u8,
    pub message: Option<String>,
    pub form_count: usize,
    pub cta_count: usize,
    pub has_contact_page: bool,
    pub has_case_studies: bool,
    pub has_pricing_page: bool,
    pub has_resource_downloads: bool,
    pub has_company_info: bool,
    pub has_faq: bool,
    pub has_privacy_policy: bool,
    pub degraded: bool,
}

impl LeadFacts {
    /// 固定 3 分的降级结果
    pub fn placeholder(message: impl Into<String>) -> Self {
        Self {
            score: 3,
            message: Some(message.into()),
            degraded: true,
            ..Default::default()
        }
    }
}
