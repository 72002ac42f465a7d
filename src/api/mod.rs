//! 接口层：请求校验与 HTTP 路由

pub mod router;
pub mod validation;

pub use router::{router, AnalyzeRequest, AnalyzeResponse, HealthResponse};
pub use validation::{validate_url, validate_urls};
