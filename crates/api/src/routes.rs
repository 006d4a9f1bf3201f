use axum::{
    routing::{delete, get, post},
    Router,
};

use swarm_dispatcher::SwarmDispatcher;
use swarm_infrastructure::PrometheusHandle;

use crate::handlers::{
    admin::{reset_all, reset_worker},
    status::{health_check, list_workers, metrics, swarm_status},
    swarm::{get_work, heartbeat, register, report_failure, submit_results},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: SwarmDispatcher,
    /// 未启用指标时为空，`/metrics` 返回404
    pub metrics_handle: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Worker协议
        .route("/register", post(register))
        .route("/heartbeat", post(heartbeat))
        .route("/get_work", post(get_work))
        .route("/submit_results", post(submit_results))
        .route("/report_failure", post(report_failure))
        // 状态查询
        .route("/health", get(health_check))
        .route("/status", get(swarm_status))
        .route("/workers", get(list_workers))
        .route("/metrics", get(metrics))
        // 管理操作
        .route("/admin/reset", post(reset_all))
        .route("/admin/workers/{id}", delete(reset_worker))
        .with_state(state)
}
