//! # Site Analyzer
//!
//! 批量网页分析服务：性能、SEO、移动端适配、无障碍、B2B 获客能力
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() / content() 能力
//! - `Renderer` / `Tab` / `PageProbe` - 渲染器抽象，测试中可替换
//! - `browser/` - 启动 Chromium、限制实例数量的浏览器池
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面
//! - 性能 / SEO / 移动端 / 无障碍 / 获客能力分析器
//! - `scoring` - 评分规则
//! - `NarrativeService` - 改进建议生成
//! - `HtmlReportWriter` - 写报告
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个页面"的完整分析流程
//! - `PageCtx` - 上下文封装（session_id + index + url）
//! - `PageFlow` - 流程编排（导航 → 并发分析 → 评分 → 建议）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批次处理器，管理浏览器租用、会话状态和报告
//! - `session/` - 会话与带 TTL 清理的存储
//! - `api/` - 请求校验与 HTTP 接口
//!
//! ## 模块结构

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出常用类型
pub use browser::{ChromiumLauncher, LaunchSettings, RendererPool};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{JsExecutor, PageProbe, Renderer, RendererLauncher, Tab};
pub use models::{PageEntry, PageError, PageResult, Scores};
pub use orchestrator::{BatchLimits, BatchProcessor};
pub use session::{Session, SessionStatus, SessionStore};
pub use workflow::{PageCtx, PageFlow};
