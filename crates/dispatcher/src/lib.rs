//! Dispatcher composition root
//!
//! 组装调度中心的各个服务：Worker注册表、优先级选择、任务调度、结果合并、
//! 超时任务回收、状态汇总与管理操作。所有服务只通过仓储接口共享状态，
//! 可以在多个调度中心实例之间水平扩展。

pub mod admin;
pub mod merger;
pub mod priority_cache;
pub mod reaper;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use swarm_core::{config::DispatcherConfig, routing::CapabilityRouter};
use swarm_infrastructure::{MetricsCollector, Repositories};

pub use admin::{AdminService, ResetReport};
pub use merger::{ResultMerger, SubmitOutcome};
pub use priority_cache::PriorityCache;
pub use reaper::{ReapReport, ReaperConfig, StaleTaskReaper};
pub use registry::WorkerRegistry;
pub use scheduler::{SchedulerSettings, TaskScheduler};
pub use selector::PrioritySelector;
pub use status::SwarmStatusService;

/// 调度中心的全部服务
#[derive(Clone)]
pub struct SwarmDispatcher {
    pub registry: Arc<WorkerRegistry>,
    pub selector: Arc<PrioritySelector>,
    pub scheduler: Arc<TaskScheduler>,
    pub merger: Arc<ResultMerger>,
    pub reaper: Arc<StaleTaskReaper>,
    pub status: Arc<SwarmStatusService>,
    pub admin: Arc<AdminService>,
}

impl SwarmDispatcher {
    pub fn new(
        repositories: Repositories,
        config: &DispatcherConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let Repositories {
            records,
            workers,
            tasks,
        } = repositories;
        let threshold = config.completion_threshold;

        let registry = Arc::new(WorkerRegistry::new(
            workers.clone(),
            CapabilityRouter::new(config.tiers),
            config.staleness_window_seconds,
            metrics.clone(),
        ));

        let cache = config.priority_cache.enabled.then(|| {
            Arc::new(PriorityCache::new(
                records.clone(),
                threshold,
                Duration::from_secs(config.priority_cache.ttl_seconds),
                config.priority_cache.capacity,
            ))
        });

        let mut selector = PrioritySelector::new(records.clone(), threshold);
        if let Some(cache) = &cache {
            selector = selector.with_cache(cache.clone());
        }
        let selector = Arc::new(selector);

        let scheduler = Arc::new(TaskScheduler::new(
            registry.clone(),
            selector.clone(),
            records.clone(),
            tasks.clone(),
            SchedulerSettings::from(config),
            metrics.clone(),
        ));

        let merger = Arc::new(ResultMerger::new(
            tasks.clone(),
            records.clone(),
            workers.clone(),
            threshold,
            metrics.clone(),
        ));

        let reaper = Arc::new(StaleTaskReaper::new(
            tasks.clone(),
            registry.clone(),
            Some(ReaperConfig::from(config)),
            metrics,
        ));

        let status = Arc::new(SwarmStatusService::new(
            registry.clone(),
            records.clone(),
            tasks.clone(),
        ));

        let admin = Arc::new(AdminService::new(workers, tasks, records, threshold, cache));

        Self {
            registry,
            selector,
            scheduler,
            merger,
            reaper,
            status,
            admin,
        }
    }
}
