use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use swarm_core::{
    config::{DispatcherConfig, SelectionMode},
    models::{ComponentType, Task, TaskStatus, WorkerInfo},
    traits::{RecordRepository, TaskRepository},
    SwarmResult,
};
use swarm_infrastructure::MetricsCollector;

use crate::{registry::WorkerRegistry, selector::PrioritySelector};

/// 任务调度参数
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_components_per_task: usize,
    pub oversample_factor: usize,
    pub max_tasks_per_poll: u32,
    pub selection_mode: SelectionMode,
    pub avoid_in_flight: bool,
    pub recycle_scan_limit: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&DispatcherConfig::default())
    }
}

impl From<&DispatcherConfig> for SchedulerSettings {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            max_components_per_task: config.max_components_per_task,
            oversample_factor: config.oversample_factor,
            max_tasks_per_poll: config.max_tasks_per_poll,
            selection_mode: config.selection_mode,
            avoid_in_flight: config.avoid_in_flight,
            recycle_scan_limit: config.recycle_scan_limit,
        }
    }
}

/// 任务调度器
///
/// 读取候选记录后直接创建任务，不加全局锁。两个Worker并发拉取时可能拿到相同的缺失组件，
/// 结果合并按组件覆盖写入，重复生成只浪费算力，不会破坏记录。
pub struct TaskScheduler {
    registry: Arc<WorkerRegistry>,
    selector: Arc<PrioritySelector>,
    record_repo: Arc<dyn RecordRepository>,
    task_repo: Arc<dyn TaskRepository>,
    settings: SchedulerSettings,
    metrics: Arc<MetricsCollector>,
}

impl TaskScheduler {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        selector: Arc<PrioritySelector>,
        record_repo: Arc<dyn RecordRepository>,
        task_repo: Arc<dyn TaskRepository>,
        settings: SchedulerSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            selector,
            record_repo,
            task_repo,
            settings,
            metrics,
        }
    }

    /// 为Worker分配至多 `max_tasks` 个任务
    ///
    /// 未注册的Worker或 `max_tasks == 0` 得到空列表，超过 `max_tasks_per_poll` 的请求按上限处理。
    /// 优先重新分配被回收的任务，剩余名额从候选记录创建新任务。
    pub async fn get_work(&self, worker_id: &str, max_tasks: u32) -> SwarmResult<Vec<Task>> {
        let Some(worker) = self.registry.get(worker_id).await? else {
            debug!("未注册的Worker请求任务: {}", worker_id);
            return Ok(Vec::new());
        };
        self.registry.touch(worker_id).await?;

        if worker.assigned_components.is_empty() || max_tasks == 0 {
            return Ok(Vec::new());
        }

        let max_tasks = max_tasks.min(self.settings.max_tasks_per_poll) as usize;
        let now = Utc::now();

        let mut tasks = self.recycle_tasks(&worker, max_tasks, now).await?;
        let recycled = tasks.len();

        if tasks.len() < max_tasks {
            let taken: HashSet<String> = tasks.iter().map(|t| t.record_id.clone()).collect();
            let fresh = self
                .create_fresh_tasks(&worker, max_tasks - tasks.len(), &taken, now)
                .await?;
            tasks.extend(fresh);
        }

        if !tasks.is_empty() {
            info!(
                "为Worker {} 分配了 {} 个任务（其中回收任务 {} 个）",
                worker.id,
                tasks.len(),
                recycled
            );
        }
        Ok(tasks)
    }

    /// 本次可分配给该Worker的组件：缺失组件与Worker组件集合的交集，按上限截断
    fn assignable(&self, worker: &WorkerInfo, missing: &[ComponentType]) -> Vec<ComponentType> {
        missing
            .iter()
            .copied()
            .filter(|c| worker.assigned_components.contains(c))
            .take(self.settings.max_components_per_task)
            .collect()
    }

    async fn recycle_tasks(
        &self,
        worker: &WorkerInfo,
        max_tasks: usize,
        now: DateTime<Utc>,
    ) -> SwarmResult<Vec<Task>> {
        let recyclable = self
            .task_repo
            .find_recyclable(self.settings.recycle_scan_limit)
            .await?;
        let mut tasks = Vec::new();

        for mut task in recyclable {
            if tasks.len() >= max_tasks {
                break;
            }

            let Some(record) = self.record_repo.get_by_id(&task.record_id).await? else {
                warn!("回收任务 {} 的记录 {} 不存在", task.task_id, task.record_id);
                continue;
            };

            let still_missing = record.missing_from(&task.components);
            if still_missing.is_empty() {
                // 组件已由其他提交补齐
                self.task_repo.complete(&task.task_id, now, None).await?;
                debug!("回收任务 {} 已被其他提交覆盖，直接关闭", task.task_id);
                continue;
            }

            let components = self.assignable(worker, &still_missing);
            if components.is_empty() {
                continue;
            }

            if self
                .task_repo
                .reassign(&task.task_id, &worker.id, &components, now)
                .await?
            {
                task.assigned_to = Some(worker.id.clone());
                task.components = components;
                task.status = TaskStatus::Assigned;
                task.assigned_at = now;
                task.completed_at = None;
                task.failure_reason = None;
                task.reassign_count += 1;
                tasks.push(task);
            }
        }

        self.metrics.record_tasks_recycled(tasks.len());
        Ok(tasks)
    }

    async fn create_fresh_tasks(
        &self,
        worker: &WorkerInfo,
        wanted: usize,
        taken: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> SwarmResult<Vec<Task>> {
        let threshold = self.selector.completion_threshold();
        let candidates = self
            .selector
            .select_candidates(
                wanted.saturating_mul(self.settings.oversample_factor),
                self.settings.selection_mode,
                &worker.assigned_components,
            )
            .await?;

        let mut tasks = Vec::new();
        for record in candidates {
            if tasks.len() >= wanted {
                break;
            }
            if taken.contains(&record.id) || !record.needs_work(threshold) {
                continue;
            }

            let mut missing = record.missing_from(&worker.assigned_components);
            if self.settings.avoid_in_flight && !missing.is_empty() {
                let in_flight = self.task_repo.in_flight_components(&record.id).await?;
                missing.retain(|c| !in_flight.contains(c));
            }

            let components = self.assignable(worker, &missing);
            if components.is_empty() {
                continue;
            }

            let task = Task::new(&record.id, record.summary(), &worker.id, components, now);
            self.task_repo.create(&task).await?;
            debug!(
                "创建任务 {}: 记录 {}，组件 {:?}",
                task.task_id, task.record_id, task.components
            );
            tasks.push(task);
        }

        self.metrics.record_tasks_created(tasks.len());
        Ok(tasks)
    }
}
