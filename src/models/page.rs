use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};
use crate::models::findings::{
    AccessibilityFacts, LeadFacts, MobileFacts, PerformanceFacts, SeoFacts,
};

/// 五项评分（各 1-5 分）及总分（5-25 分）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub performance: u8,
    pub seo: u8,
    pub mobile: u8,
    pub accessibility: u8,
    pub b2b_lead: u8,
    pub overall: u8,
}

impl Scores {
    /// 总分百分比
    pub fn percentage(&self) -> u32 {
        (self.overall as f64 / 25.0 * 100.0).round() as u32
    }
}

/// 改进建议文本的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    /// 文本生成服务
    Llm,
    /// 未配置服务时的本地规则生成
    Fallback,
    /// 已配置但调用失败
    Unavailable,
}

/// 单页分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub scores: Scores,
    pub performance: PerformanceFacts,
    pub seo: SeoFacts,
    pub mobile: MobileFacts,
    pub accessibility: AccessibilityFacts,
    #[serde(rename = "b2b")]
    pub lead: LeadFacts,
    /// HTML 片段
    pub suggestions: Option<String>,
    pub narrative_source: NarrativeSource,
}

/// 单页分析失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub url: String,
    pub error: String,
    pub kind: ErrorKind,
}

impl PageError {
    pub fn from_error(url: impl Into<String>, err: &AppError) -> Self {
        Self {
            url: url.into(),
            error: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// 会话结果列表中的一项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageEntry {
    Result(Box<PageResult>),
    Error(PageError),
}

impl PageEntry {
    pub fn url(&self) -> &str {
        match self {
            PageEntry::Result(r) => &r.url,
            PageEntry::Error(e) => &e.url,
        }
    }

    pub fn as_result(&self) -> Option<&PageResult> {
        match self {
            PageEntry::Result(r) => Some(r),
            PageEntry::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PageEntry::Error(_))
    }
}
