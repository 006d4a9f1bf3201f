use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use swarm_core::{SwarmError, SwarmResult};

use crate::client::DispatcherClient;

/// State shared between the poll loop and the heartbeat task.
#[derive(Debug, Default)]
pub struct WorkerState {
    active_tasks: AtomicU32,
    needs_registration: AtomicBool,
}

impl WorkerState {
    pub fn active_tasks(&self) -> u32 {
        self.active_tasks.load(Ordering::Relaxed)
    }

    pub fn task_started(&self) {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_finished(&self) {
        let _ = self
            .active_tasks
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn needs_registration(&self) -> bool {
        self.needs_registration.load(Ordering::Relaxed)
    }

    pub fn set_needs_registration(&self, value: bool) {
        self.needs_registration.store(value, Ordering::Relaxed);
    }

    pub fn status_label(&self) -> &'static str {
        if self.active_tasks() > 0 {
            "busy"
        } else {
            "idle"
        }
    }
}

pub struct HeartbeatManager {
    worker_id: String,
    heartbeat_interval: Duration,
    dispatcher_client: Arc<DispatcherClient>,
    state: Arc<WorkerState>,
}

impl HeartbeatManager {
    pub fn new(
        worker_id: String,
        heartbeat_interval: Duration,
        dispatcher_client: Arc<DispatcherClient>,
        state: Arc<WorkerState>,
    ) -> Self {
        Self {
            worker_id,
            heartbeat_interval,
            dispatcher_client,
            state,
        }
    }

    /// Send one heartbeat. An unknown-worker answer flags the poll loop to re-register.
    pub async fn beat(&self) -> SwarmResult<()> {
        let result = self
            .dispatcher_client
            .heartbeat(
                &self.worker_id,
                self.state.status_label(),
                self.state.active_tasks(),
            )
            .await;

        match result {
            Ok(_) => {
                debug!("Heartbeat sent for worker {}", self.worker_id);
                Ok(())
            }
            Err(e @ SwarmError::WorkerNotFound { .. }) => {
                warn!(
                    "Dispatcher does not know worker {}, scheduling re-registration",
                    self.worker_id
                );
                self.state.set_needs_registration(true);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut heartbeat_interval = interval(self.heartbeat_interval);
            loop {
                tokio::select! {
                    _ = heartbeat_interval.tick() => {
                        if let Err(e) = self.beat().await {
                            warn!("Failed to send heartbeat: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Heartbeat task shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_task_counter_never_underflows() {
        let state = WorkerState::default();
        state.task_finished();
        assert_eq!(state.active_tasks(), 0);

        state.task_started();
        state.task_started();
        assert_eq!(state.status_label(), "busy");
        state.task_finished();
        state.task_finished();
        assert_eq!(state.status_label(), "idle");
    }
}
