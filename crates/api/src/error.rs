use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use swarm_core::SwarmError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度错误: {0}")]
    Swarm(#[from] SwarmError),

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            ApiError::Swarm(err) => match err {
                SwarmError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
                }
                SwarmError::WorkerNotFound { id } => (
                    StatusCode::NOT_FOUND,
                    format!("Worker {} 不存在", id),
                    "WORKER_NOT_FOUND",
                ),
                SwarmError::TaskNotFound { id } => (
                    StatusCode::NOT_FOUND,
                    format!("任务 {} 不存在", id),
                    "TASK_NOT_FOUND",
                ),
                SwarmError::RecordNotFound { id } => (
                    StatusCode::NOT_FOUND,
                    format!("记录 {} 不存在", id),
                    "RECORD_NOT_FOUND",
                ),
                SwarmError::Forbidden { task_id, worker_id } => (
                    StatusCode::FORBIDDEN,
                    format!("任务 {} 不属于Worker {}", task_id, worker_id),
                    "FORBIDDEN",
                ),
                SwarmError::TransientInfra(_)
                | SwarmError::Database(_)
                | SwarmError::Network(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "服务暂时不可用，请稍后重试".to_string(),
                    "SERVICE_UNAVAILABLE",
                ),
                SwarmError::Inference(_)
                | SwarmError::Serialization(_)
                | SwarmError::Configuration(_)
                | SwarmError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "系统内部错误".to_string(),
                    "INTERNAL_ERROR",
                ),
            },
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求格式错误: {}", msg),
                "BAD_REQUEST",
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_type) = self.parts();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
