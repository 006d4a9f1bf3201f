use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use swarm_core::{protocol::WorkItem, traits::InferenceBackend, SwarmResult};

use crate::{
    client::DispatcherClient,
    executor::{ExecutionOutcome, TaskExecutor},
    hardware::WorkerProfile,
    heartbeat::{HeartbeatManager, WorkerState},
};

/// Totals reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

/// Register, keep a heartbeat running, and poll for work until shutdown.
pub struct WorkerLifecycle {
    profile: WorkerProfile,
    heartbeat_interval: Duration,
    dispatcher_client: Arc<DispatcherClient>,
    executor: TaskExecutor,
    state: Arc<WorkerState>,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl WorkerLifecycle {
    pub fn new(
        profile: WorkerProfile,
        heartbeat_interval: Duration,
        dispatcher_client: Arc<DispatcherClient>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        let executor = TaskExecutor::new(backend, profile.worker_id.clone());
        Self {
            profile,
            heartbeat_interval,
            dispatcher_client,
            executor,
            state: Arc::new(WorkerState::default()),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.profile.worker_id
    }

    pub fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.state)
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SwarmResult<WorkerSummary> {
        info!(
            "Starting worker {} (tier {}, max {} tasks per poll)",
            self.profile.worker_id, self.profile.tier, self.profile.max_tasks
        );

        if !self.register_until_ready(&mut shutdown_rx).await {
            info!("Shutdown requested before registration completed");
            return Ok(self.summary());
        }

        let heartbeat = Arc::new(HeartbeatManager::new(
            self.profile.worker_id.clone(),
            self.heartbeat_interval,
            Arc::clone(&self.dispatcher_client),
            Arc::clone(&self.state),
        ));
        let heartbeat_handle = heartbeat.start(shutdown_rx.resubscribe());

        loop {
            let pause = tokio::select! {
                result = self.poll_once() => match result {
                    Ok(0) => self.profile.idle_backoff,
                    Ok(n) => {
                        debug!("Processed {} tasks", n);
                        Duration::ZERO
                    }
                    Err(e) if e.is_retryable() => {
                        warn!("Dispatcher unavailable, backing off: {}", e);
                        self.profile.error_backoff
                    }
                    Err(e) => {
                        error!("Worker loop error: {}", e);
                        self.profile.error_backoff
                    }
                },
                _ = shutdown_rx.recv() => break,
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = shutdown_rx.recv() => break,
                }
            }
        }

        if let Err(e) = heartbeat_handle.await {
            warn!("Heartbeat task ended abnormally: {}", e);
        }

        let summary = self.summary();
        info!(
            "Worker {} stopped: {} completed, {} failed",
            self.profile.worker_id, summary.tasks_completed, summary.tasks_failed
        );
        Ok(summary)
    }

    /// One poll cycle; returns how many tasks were handled.
    pub async fn poll_once(&self) -> SwarmResult<usize> {
        if self.state.needs_registration() {
            self.register().await?;
        }

        let items = self
            .dispatcher_client
            .get_work(&self.profile.worker_id, self.profile.max_tasks)
            .await?;
        if items.is_empty() {
            return Ok(0);
        }

        info!("Received {} task(s)", items.len());
        for item in &items {
            self.process(item).await;
        }
        Ok(items.len())
    }

    async fn register(&self) -> SwarmResult<()> {
        let response = self
            .dispatcher_client
            .register(&self.profile.worker_id, &self.profile.capabilities)
            .await?;
        self.state.set_needs_registration(false);
        info!(
            "Registered worker {} with {} assigned components",
            response.worker_id,
            response.assigned_components.len()
        );
        Ok(())
    }

    async fn register_until_ready(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        loop {
            match self.register().await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        "Registration failed, retrying in {:?}: {}",
                        self.profile.error_backoff, e
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.profile.error_backoff) => {}
                _ = shutdown_rx.recv() => return false,
            }
        }
    }

    /// Submission errors are logged only; the reaper recycles anything left behind.
    async fn process(&self, item: &WorkItem) {
        self.state.task_started();

        match self.executor.execute(item).await {
            ExecutionOutcome::Completed(request) => {
                match self.dispatcher_client.submit_results(&request).await {
                    Ok(ack) => {
                        self.completed.fetch_add(1, Ordering::Relaxed);
                        info!("Submitted task {}: {}", item.task_id, ack.message);
                    }
                    Err(e) => error!("Failed to submit task {}: {}", item.task_id, e),
                }
            }
            ExecutionOutcome::Failed { reason } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = self
                    .dispatcher_client
                    .report_failure(&self.profile.worker_id, &item.task_id, &reason)
                    .await
                {
                    error!("Failed to report failure for task {}: {}", item.task_id, e);
                }
            }
        }

        self.state.task_finished();
    }

    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            tasks_completed: self.completed.load(Ordering::Relaxed),
            tasks_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
