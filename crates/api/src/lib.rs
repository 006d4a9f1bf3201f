//! # Swarm API
//!
//! 调度中心的HTTP控制面，基于Axum构建。
//!
//! ## API 端点
//!
//! ### Worker协议
//! - `POST /register` - 注册Worker，返回可生成的组件集合
//! - `POST /heartbeat` - 心跳，未注册的Worker返回404
//! - `POST /get_work` - 拉取任务
//! - `POST /submit_results` - 提交组件结果
//! - `POST /report_failure` - 报告任务失败
//!
//! ### 状态查询
//! - `GET /health` - 健康检查
//! - `GET /status` - Worker、任务与记录的汇总计数
//! - `GET /workers` - Worker列表
//! - `GET /metrics` - Prometheus指标
//!
//! ### 管理操作
//! - `POST /admin/reset` - 注销全部Worker并清理未完成任务
//! - `DELETE /admin/workers/{id}` - 注销单个Worker
//!
//! 错误统一返回 `{"error": {"message", "type", "code", "timestamp"}}`。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

use swarm_core::config::ApiConfig;
use swarm_dispatcher::SwarmDispatcher;
use swarm_infrastructure::PrometheusHandle;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

pub use error::{ApiError, ApiResult};

/// 创建完整的API应用
pub fn create_app(
    dispatcher: SwarmDispatcher,
    metrics_handle: Option<PrometheusHandle>,
    api_config: &ApiConfig,
) -> Router {
    let state = AppState {
        dispatcher,
        metrics_handle,
    };

    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
