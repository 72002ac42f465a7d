//! 渲染器抽象
//!
//! 编排层和分析器只依赖这里的 trait，真实实现见 `browser::launch`，
//! 测试中用假实现替换。

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};

/// 已加载页面的只读能力（分析器的输入）
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// 执行 JS 表达式，Promise 会被等待
    async fn eval(&self, js_code: &str) -> AppResult<JsonValue>;

    /// 当前文档的完整 HTML
    async fn content(&self) -> AppResult<String>;
}

/// 渲染器中的一个标签页
#[async_trait]
pub trait Tab: PageProbe {
    /// 导航并等待页面加载完成（超时由调用方控制）
    async fn goto(&self, url: &str) -> AppResult<()>;

    async fn close(&self) -> AppResult<()>;
}

/// 一个已启动的渲染器实例（浏览器进程）
#[async_trait]
pub trait Renderer: Send + Sync {
    /// 实例编号（仅用于日志）
    fn id(&self) -> u64;

    /// 浏览器进程是否仍在运行（崩溃或已关闭时为 false）
    fn is_alive(&self) -> bool;

    async fn new_tab(&self) -> AppResult<Box<dyn Tab>>;

    /// 关闭浏览器进程
    async fn shutdown(&self) -> AppResult<()>;
}

/// 渲染器启动器
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self) -> AppResult<Arc<dyn Renderer>>;
}

/// 执行 JS 代码并反序列化为指定类型
///
/// # 参数
/// - `probe`: 页面
/// - `analyzer`: 分析器名称（用于错误信息）
/// - `js_code`: 要执行的 JavaScript 代码
pub async fn eval_as<T, P>(probe: &P, analyzer: &str, js_code: &str) -> AppResult<T>
where
    T: DeserializeOwned,
    P: PageProbe + ?Sized,
{
    let json_value = probe.eval(js_code).await?;
    serde_json::from_value(json_value)
        .map_err(|e| AppError::invalid_payload(analyzer, e.to_string()))
}
