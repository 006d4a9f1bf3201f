use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use swarm_core::protocol::STATUS_SUCCESS;

use crate::{error::ApiResult, routes::AppState};

/// 注销全部Worker并清理未完成任务
pub async fn reset_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let report = state.dispatcher.admin.reset_all().await?;
    Ok(Json(json!({
        "status": STATUS_SUCCESS,
        "workers_removed": report.workers_removed,
        "tasks_deleted": report.tasks_deleted,
        "records_corrected": report.records_corrected,
    })))
}

pub async fn reset_worker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let released = state.dispatcher.admin.reset_worker(&id).await?;
    Ok(Json(json!({
        "status": STATUS_SUCCESS,
        "worker_id": id,
        "released_tasks": released,
    })))
}
