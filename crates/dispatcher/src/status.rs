use std::sync::Arc;

use chrono::{DateTime, Utc};

use swarm_core::{
    models::{SwarmStatus, WorkerCounts, WorkerInfo},
    traits::{RecordRepository, TaskRepository},
    SwarmResult,
};

use crate::registry::WorkerRegistry;

/// 汇总Worker、任务与记录的完成情况
pub struct SwarmStatusService {
    registry: Arc<WorkerRegistry>,
    record_repo: Arc<dyn RecordRepository>,
    task_repo: Arc<dyn TaskRepository>,
}

impl SwarmStatusService {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        record_repo: Arc<dyn RecordRepository>,
        task_repo: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            registry,
            record_repo,
            task_repo,
        }
    }

    pub async fn status(&self, now: DateTime<Utc>) -> SwarmResult<SwarmStatus> {
        let workers = self.registry.list().await?;
        let tasks = self.task_repo.counts().await?;
        let records = self.record_repo.counts().await?;

        Ok(SwarmStatus {
            workers: self.worker_counts(&workers, now),
            tasks,
            records,
        })
    }

    /// 活跃与否按心跳时间实时计算，不依赖回收器是否已经更新状态字段
    fn worker_counts(&self, workers: &[WorkerInfo], now: DateTime<Utc>) -> WorkerCounts {
        let stale = workers
            .iter()
            .filter(|w| self.registry.is_stale(w, now))
            .count() as u64;
        WorkerCounts {
            total: workers.len() as u64,
            active: workers.len() as u64 - stale,
            stale,
        }
    }
}
