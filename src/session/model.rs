use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PageEntry;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// 生成会话ID：`{毫秒时间戳}-{序号}`，同一毫秒内的请求也不会重复
pub fn next_session_id() -> String {
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", Utc::now().timestamp_millis(), seq)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    /// 批次整体失败（如浏览器无法启动）
    Error,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

/// 一次批量分析请求的进度与结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    /// 当前（或刚处理完）的页面索引，完成后等于 total
    pub progress: usize,
    pub total: usize,
    pub current_url: Option<String>,
    /// 按输入顺序追加
    pub results: Vec<PageEntry>,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, total: usize, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Running,
            progress: 0,
            total,
            current_url: None,
            results: Vec::new(),
            created_at,
            error: None,
        }
    }

    /// 开始处理第 `index` 个页面
    pub fn begin_page(&mut self, index: usize, url: &str) {
        self.progress = self.progress.max(index);
        self.current_url = Some(url.to_string());
    }

    pub fn push(&mut self, entry: PageEntry) {
        self.results.push(entry);
    }

    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.progress = self.total;
        self.current_url = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.error = Some(message.into());
        self.current_url = None;
    }

    pub fn mark_cancelled(&mut self) {
        self.status = SessionStatus::Cancelled;
        self.current_url = None;
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|e| !e.is_error()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|e| e.is_error()).count()
    }
}
