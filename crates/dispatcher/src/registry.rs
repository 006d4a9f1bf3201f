use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use swarm_core::{
    models::{WorkerCapabilities, WorkerInfo, WorkerStatus},
    routing::CapabilityRouter,
    traits::WorkerRepository,
    SwarmError, SwarmResult,
};
use swarm_infrastructure::MetricsCollector;

/// Worker注册表
///
/// 负责注册（按id幂等更新）、心跳与失活判断。失活只是健康提示，不会注销Worker。
pub struct WorkerRegistry {
    worker_repo: Arc<dyn WorkerRepository>,
    router: CapabilityRouter,
    staleness_window: Duration,
    metrics: Arc<MetricsCollector>,
}

impl WorkerRegistry {
    pub fn new(
        worker_repo: Arc<dyn WorkerRepository>,
        router: CapabilityRouter,
        staleness_window_seconds: i64,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            worker_repo,
            router,
            staleness_window: Duration::seconds(staleness_window_seconds),
            metrics,
        }
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    /// 注册或重新注册Worker
    ///
    /// 每次注册都重新计算能力层级，硬件变化立即生效；已有的计数器与注册时间保留。
    pub async fn register(
        &self,
        worker_id: &str,
        capabilities: WorkerCapabilities,
    ) -> SwarmResult<WorkerInfo> {
        let worker_id = worker_id.trim();
        if worker_id.is_empty() {
            return Err(SwarmError::Validation("worker_id不能为空".to_string()));
        }

        let classification = self.router.classify(&capabilities);
        let worker = WorkerInfo::new(
            worker_id,
            capabilities,
            classification.tier,
            classification.components,
            Utc::now(),
        );

        let stored = self.worker_repo.upsert(&worker).await?;
        self.metrics
            .record_worker_registered(&stored.id, stored.tier.as_str());

        info!(
            "Worker {} 注册成功，层级: {}，可生成组件 {} 个",
            stored.id,
            stored.tier,
            stored.assigned_components.len()
        );
        Ok(stored)
    }

    /// 处理心跳，Worker未注册时返回 `WorkerNotFound`
    pub async fn heartbeat(
        &self,
        worker_id: &str,
        reported_status: Option<&str>,
        active_tasks: Option<u32>,
    ) -> SwarmResult<DateTime<Utc>> {
        if worker_id.trim().is_empty() {
            return Err(SwarmError::Validation("worker_id不能为空".to_string()));
        }

        let now = Utc::now();
        if !self
            .worker_repo
            .touch_heartbeat(worker_id, now, active_tasks)
            .await?
        {
            warn!("收到未注册Worker的心跳: {}", worker_id);
            return Err(SwarmError::WorkerNotFound {
                id: worker_id.to_string(),
            });
        }

        debug!(
            "Worker {} 心跳，状态: {}，进行中任务: {:?}",
            worker_id,
            reported_status.unwrap_or("unknown"),
            active_tasks
        );
        Ok(now)
    }

    /// 拉取任务时顺带刷新心跳，返回Worker是否存在
    pub async fn touch(&self, worker_id: &str) -> SwarmResult<bool> {
        self.worker_repo
            .touch_heartbeat(worker_id, Utc::now(), None)
            .await
    }

    pub fn is_stale(&self, worker: &WorkerInfo, now: DateTime<Utc>) -> bool {
        worker.is_stale_at(now, self.staleness_window)
    }

    pub async fn get(&self, worker_id: &str) -> SwarmResult<Option<WorkerInfo>> {
        self.worker_repo.get_by_id(worker_id).await
    }

    pub async fn list(&self) -> SwarmResult<Vec<WorkerInfo>> {
        self.worker_repo.list().await
    }

    /// 将心跳超时的活跃Worker标记为stale，返回本次标记的Worker
    pub async fn mark_stale_workers(&self, now: DateTime<Utc>) -> SwarmResult<Vec<String>> {
        let workers = self.worker_repo.list().await?;
        let mut newly_stale = Vec::new();
        let mut active = 0;
        let mut stale = 0;

        for worker in &workers {
            if !self.is_stale(worker, now) {
                active += 1;
                continue;
            }
            stale += 1;
            if worker.status == WorkerStatus::Active {
                match self
                    .worker_repo
                    .update_status(&worker.id, WorkerStatus::Stale)
                    .await
                {
                    Ok(()) => newly_stale.push(worker.id.clone()),
                    // 并发注销时忽略
                    Err(SwarmError::WorkerNotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        self.metrics.update_worker_gauges(active, stale);
        if !newly_stale.is_empty() {
            warn!("{} 个Worker心跳超时: {:?}", newly_stale.len(), newly_stale);
        }
        Ok(newly_stale)
    }
}
