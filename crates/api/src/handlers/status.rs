use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use swarm_core::models::{CapabilityTier, SwarmStatus, WorkerStatus};

use crate::{
    error::{ApiError, ApiResult},
    routes::AppState,
};

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Worker、任务与记录的汇总计数
pub async fn swarm_status(State(state): State<AppState>) -> ApiResult<Json<SwarmStatus>> {
    let status = state.dispatcher.status.status(Utc::now()).await?;
    Ok(Json(status))
}

/// Worker列表中的单项
#[derive(Debug, Serialize)]
pub struct WorkerView {
    pub id: String,
    pub tier: CapabilityTier,
    pub status: WorkerStatus,
    pub assigned_components: usize,
    pub active_tasks: u32,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

pub async fn list_workers(State(state): State<AppState>) -> ApiResult<Json<Vec<WorkerView>>> {
    let now = Utc::now();
    let registry = &state.dispatcher.registry;
    let workers = registry.list().await?;

    let views = workers
        .into_iter()
        .map(|w| WorkerView {
            status: if registry.is_stale(&w, now) {
                WorkerStatus::Stale
            } else {
                WorkerStatus::Active
            },
            id: w.id,
            tier: w.tier,
            assigned_components: w.assigned_components.len(),
            active_tasks: w.active_tasks,
            tasks_completed: w.tasks_completed,
            tasks_failed: w.tasks_failed,
            last_heartbeat: w.last_heartbeat,
            registered_at: w.registered_at,
        })
        .collect();
    Ok(Json(views))
}

/// Prometheus文本格式的指标
pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let handle = state.metrics_handle.as_ref().ok_or(ApiError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
