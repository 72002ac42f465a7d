//! HTTP 接口
//!
//! - `POST /api/analyze`：提交批次
//! - `GET /api/status/{session_id}`：查询会话
//! - `POST /api/cancel/{session_id}`：取消批次
//! - `GET /health`：健康检查

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::error::{AppError, ValidationError};
use crate::orchestrator::BatchProcessor;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub narrative_configured: bool,
}

pub fn router(processor: Arc<BatchProcessor>) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/status/{session_id}", get(status))
        .route("/api/cancel/{session_id}", post(cancel))
        .route("/health", get(health))
        .with_state(processor)
}

async fn analyze(
    State(processor): State<Arc<BatchProcessor>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    // 缺少 urls、类型不对或不是 JSON 都按校验错误返回 400
    let Json(request) = payload.map_err(|rejection| ValidationError::InvalidBody {
        reason: rejection.body_text(),
    })?;
    let session_id = processor.submit(&request.urls).await?;
    info!("[会话 {}] 📥 已受理 {} 个 URL", session_id, request.urls.len());
    Ok(Json(AnalyzeResponse {
        session_id,
        message: "分析已开始".to_string(),
    }))
}

async fn status(
    State(processor): State<Arc<BatchProcessor>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(processor.status(&session_id)?))
}

async fn cancel(
    State(processor): State<Arc<BatchProcessor>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    processor.cancel(&session_id)?;
    Ok(StatusCode::ACCEPTED)
}

async fn health(State(processor): State<Arc<BatchProcessor>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        narrative_configured: processor.narrative_configured(),
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Session(_) => StatusCode::NOT_FOUND,
            _ => {
                error!("请求处理失败: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
