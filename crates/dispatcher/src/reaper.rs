use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use swarm_core::{config::DispatcherConfig, traits::TaskRepository, SwarmResult};
use swarm_infrastructure::MetricsCollector;

use crate::registry::WorkerRegistry;

/// 超时任务回收配置
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// 任务超时时间（秒）
    pub task_timeout_seconds: i64,
    /// 扫描间隔（秒）
    pub sweep_interval_seconds: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            task_timeout_seconds: 1800, // 30分钟未完成即回收
            sweep_interval_seconds: 60, // 每分钟扫描一次
        }
    }
}

impl From<&DispatcherConfig> for ReaperConfig {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            task_timeout_seconds: config.task_timeout_seconds,
            sweep_interval_seconds: config.reap_interval_seconds,
        }
    }
}

/// 单次扫描结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReapReport {
    pub released_tasks: Vec<String>,
    pub stale_workers: Vec<String>,
}

/// 超时任务回收器
///
/// 清空超时任务的归属，使其重新进入可分配状态，同时顺带标记心跳超时的Worker。
/// 不依赖Worker配合，崩溃或网络隔离的Worker留下的任务都由这里兜底。
pub struct StaleTaskReaper {
    task_repo: Arc<dyn TaskRepository>,
    registry: Arc<WorkerRegistry>,
    config: ReaperConfig,
    metrics: Arc<MetricsCollector>,
    running: Arc<RwLock<bool>>,
}

impl StaleTaskReaper {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        registry: Arc<WorkerRegistry>,
        config: Option<ReaperConfig>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            task_repo,
            registry,
            config: config.unwrap_or_default(),
            metrics,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// 执行一次扫描
    pub async fn sweep(&self, now: DateTime<Utc>) -> SwarmResult<ReapReport> {
        let cutoff = now - Duration::seconds(self.config.task_timeout_seconds);
        let released = self.task_repo.release_expired(cutoff).await?;

        for task in &released {
            warn!(
                "回收超时任务 {}（记录 {}，分配于 {}）",
                task.task_id,
                task.record_id,
                task.assigned_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        self.metrics.record_tasks_reaped(released.len());

        let stale_workers = self.registry.mark_stale_workers(now).await?;

        Ok(ReapReport {
            released_tasks: released.into_iter().map(|t| t.task_id).collect(),
            stale_workers,
        })
    }

    /// 在后台启动周期扫描，收到关闭信号后退出
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            *self.running.write().await = true;
            info!(
                "启动超时任务回收，超时 {} 秒，间隔 {} 秒",
                self.config.task_timeout_seconds, self.config.sweep_interval_seconds
            );

            let mut interval =
                tokio::time::interval(StdDuration::from_secs(self.config.sweep_interval_seconds));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !*self.running.read().await {
                            break;
                        }
                        match self.sweep(Utc::now()).await {
                            Ok(report) if !report.released_tasks.is_empty() => {
                                info!("本轮回收了 {} 个超时任务", report.released_tasks.len());
                            }
                            Ok(_) => debug!("本轮没有超时任务"),
                            Err(e) => error!("超时任务扫描失败: {}", e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("收到关闭信号，停止超时任务回收");
                        break;
                    }
                }
            }

            *self.running.write().await = false;
        })
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
