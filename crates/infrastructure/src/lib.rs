//! # Swarm Infrastructure
//!
//! 仓储接口的具体实现与可观测性支持：
//!
//! - [`memory`] - 进程内仓储，用于本地开发和确定性测试
//! - [`database`] - PostgreSQL仓储、连接池管理与建表脚本
//! - [`observability`] - 基于 `metrics` 的指标收集与Prometheus导出

pub mod database;
pub mod memory;
pub mod observability;

use std::sync::Arc;

use swarm_core::traits::{RecordRepository, TaskRepository, WorkerRepository};

pub use database::{DatabaseManager, PostgresRecordRepository, PostgresTaskRepository, PostgresWorkerRepository};
pub use memory::{InMemoryRecordRepository, InMemoryTaskRepository, InMemoryWorkerRepository};
pub use observability::{install_prometheus_recorder, MetricsCollector, PrometheusHandle};

/// 调度中心使用的一组仓储
#[derive(Clone)]
pub struct Repositories {
    pub records: Arc<dyn RecordRepository>,
    pub workers: Arc<dyn WorkerRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(InMemoryRecordRepository::new()),
            workers: Arc::new(InMemoryWorkerRepository::new()),
            tasks: Arc::new(InMemoryTaskRepository::new()),
        }
    }

    pub fn postgres(manager: &DatabaseManager) -> Self {
        let pool = manager.pool().clone();
        Self {
            records: Arc::new(PostgresRecordRepository::new(pool.clone())),
            workers: Arc::new(PostgresWorkerRepository::new(pool.clone())),
            tasks: Arc::new(PostgresTaskRepository::new(pool)),
        }
    }
}
