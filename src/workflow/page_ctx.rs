//! 页面处理上下文
//!
//! 封装"我正在处理哪个批次的第几个页面"这一信息

use std::fmt::Display;

/// 页面处理上下文
#[derive(Debug, Clone)]
pub struct PageCtx {
    /// 会话ID
    pub session_id: String,

    /// 页面在批次中的索引（从0开始）
    pub index: usize,

    /// 批次中的页面总数
    pub total: usize,

    /// 目标地址
    pub url: String,
}

impl PageCtx {
    pub fn new(
        session_id: impl Into<String>,
        index: usize,
        total: usize,
        url: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            index,
            total,
            url: url.into(),
        }
    }
}

impl Display for PageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[会话 {} 页面 {}/{}]",
            self.session_id,
            self.index + 1,
            self.total
        )
    }
}
