use axum::{extract::rejection::JsonRejection, extract::State, Json};

use swarm_core::protocol::{
    AckResponse, GetWorkRequest, GetWorkResponse, HeartbeatRequest, HeartbeatResponse,
    RegisterRequest, RegisterResponse, ReportFailureRequest, SubmitResultsRequest, WorkItem,
    STATUS_REGISTERED, STATUS_SUCCESS,
};

use crate::{error::ApiResult, routes::AppState};

/// Worker注册（按id幂等）
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<RegisterResponse>> {
    let Json(request) = payload?;
    let worker = state
        .dispatcher
        .registry
        .register(&request.worker_id, request.capabilities)
        .await?;

    Ok(Json(RegisterResponse {
        status: STATUS_REGISTERED.to_string(),
        worker_id: worker.id,
        assigned_components: worker.assigned_components,
    }))
}

/// Worker心跳，未注册返回404
pub async fn heartbeat(
    State(state): State<AppState>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let Json(request) = payload?;
    state
        .dispatcher
        .registry
        .heartbeat(
            &request.worker_id,
            request.status.as_deref(),
            Some(request.active_tasks),
        )
        .await?;

    Ok(Json(HeartbeatResponse {
        status: STATUS_SUCCESS.to_string(),
    }))
}

/// 拉取任务，未注册的Worker得到空列表
pub async fn get_work(
    State(state): State<AppState>,
    payload: Result<Json<GetWorkRequest>, JsonRejection>,
) -> ApiResult<Json<GetWorkResponse>> {
    let Json(request) = payload?;
    let tasks = state
        .dispatcher
        .scheduler
        .get_work(&request.worker_id, request.max_tasks)
        .await?;

    Ok(Json(GetWorkResponse {
        tasks: tasks.iter().map(WorkItem::from).collect(),
    }))
}

pub async fn submit_results(
    State(state): State<AppState>,
    payload: Result<Json<SubmitResultsRequest>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let Json(request) = payload?;
    let outcome = state.dispatcher.merger.submit_results(&request).await?;
    Ok(Json(AckResponse::success(outcome.message())))
}

pub async fn report_failure(
    State(state): State<AppState>,
    payload: Result<Json<ReportFailureRequest>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let Json(request) = payload?;
    state
        .dispatcher
        .merger
        .report_failure(&request.task_id, &request.worker_id, &request.reason)
        .await?;
    Ok(Json(AckResponse::success(format!(
        "任务 {} 已标记为失败",
        request.task_id
    ))))
}
