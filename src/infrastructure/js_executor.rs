//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"导航 / 执行 JS / 读取文档"的能力

use async_trait::async_trait;
use chromiumoxide::Page;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::renderer::{PageProbe, Tab};

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源（一个标签页）
/// - 暴露 eval() / content() 能力
/// - 不认识分析器 / 会话
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl PageProbe for JsExecutor {
    /// 执行 JS 代码并返回 JSON 结果（Promise 会被等待）
    async fn eval(&self, js_code: &str) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.to_string()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    async fn content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }
}

#[async_trait]
impl Tab for JsExecutor {
    async fn goto(&self, url: &str) -> AppResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::navigation_failed(url, e))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| AppError::navigation_failed(url, e))?;
        debug!("页面导航成功: {}", url);
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        // Page 内部是 Arc，clone 后关闭的是同一个标签页
        self.page.clone().close().await?;
        Ok(())
    }
}
