use std::sync::Arc;

use tracing::{info, warn};

use swarm_core::{
    traits::{RecordRepository, TaskRepository, WorkerRepository},
    SwarmError, SwarmResult,
};

use crate::priority_cache::PriorityCache;

/// 全量重置结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub workers_removed: u64,
    pub tasks_deleted: u64,
    /// 完成状态与组件表不一致而被修正的记录数
    pub records_corrected: u64,
}

/// 管理操作：清空Worker与未完成任务，修正记录完成状态
pub struct AdminService {
    worker_repo: Arc<dyn WorkerRepository>,
    task_repo: Arc<dyn TaskRepository>,
    record_repo: Arc<dyn RecordRepository>,
    completion_threshold: u32,
    cache: Option<Arc<PriorityCache>>,
}

impl AdminService {
    pub fn new(
        worker_repo: Arc<dyn WorkerRepository>,
        task_repo: Arc<dyn TaskRepository>,
        record_repo: Arc<dyn RecordRepository>,
        completion_threshold: u32,
        cache: Option<Arc<PriorityCache>>,
    ) -> Self {
        Self {
            worker_repo,
            task_repo,
            record_repo,
            completion_threshold,
            cache,
        }
    }

    /// 注销所有Worker并删除 assigned 状态的任务，已完成和已失败的任务保留用于审计
    pub async fn reset_all(&self) -> SwarmResult<ResetReport> {
        let workers_removed = self.worker_repo.clear().await?;
        let tasks_deleted = self.task_repo.delete_assigned().await?;
        let records_corrected = self
            .record_repo
            .recompute_completion(self.completion_threshold)
            .await?;

        if let Some(cache) = &self.cache {
            cache.invalidate().await;
        }

        let report = ResetReport {
            workers_removed,
            tasks_deleted,
            records_corrected,
        };
        warn!(
            "管理员重置: 移除 {} 个Worker，删除 {} 个未完成任务，修正 {} 条记录",
            report.workers_removed, report.tasks_deleted, report.records_corrected
        );
        Ok(report)
    }

    /// 注销单个Worker，其未完成任务立即回到可分配状态
    pub async fn reset_worker(&self, worker_id: &str) -> SwarmResult<u64> {
        if self.worker_repo.get_by_id(worker_id).await?.is_none() {
            return Err(SwarmError::WorkerNotFound {
                id: worker_id.to_string(),
            });
        }

        let released = self.task_repo.release_worker_tasks(worker_id).await?;
        self.worker_repo.remove(worker_id).await?;
        info!("注销Worker {}，释放 {} 个任务", worker_id, released);
        Ok(released)
    }
}
