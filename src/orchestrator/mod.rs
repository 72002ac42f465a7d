//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! api (HTTP：提交 / 查询 / 取消)
//!     ↓
//! batch_processor (处理 Vec<Url>，持有浏览器池和会话存储)
//!     ↓
//! workflow::PageFlow (处理单个页面)
//!     ↓
//! services (能力层：性能 / SEO / 移动端 / 无障碍 / 获客 / 评分 / 建议 / 报告)
//!     ↓
//! infrastructure (基础设施：JsExecutor、渲染器 trait)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层从池中租用浏览器
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和状态更新，不做具体分析

pub mod batch_processor;

pub use batch_processor::{BatchLimits, BatchProcessor};
