use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use swarm_core::{
    models::{WorkerInfo, WorkerStatus},
    traits::WorkerRepository,
    SwarmError, SwarmResult,
};

/// 内存Worker仓储
#[derive(Clone, Default)]
pub struct InMemoryWorkerRepository {
    workers: Arc<RwLock<HashMap<String, WorkerInfo>>>,
}

impl InMemoryWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: &str, f: F) -> SwarmResult<()>
    where
        F: FnOnce(&mut WorkerInfo) + Send,
    {
        let mut workers = self.workers.write().await;
        let worker = workers
            .get_mut(id)
            .ok_or_else(|| SwarmError::WorkerNotFound { id: id.to_string() })?;
        f(worker);
        Ok(())
    }
}

#[async_trait]
impl WorkerRepository for InMemoryWorkerRepository {
    async fn upsert(&self, worker: &WorkerInfo) -> SwarmResult<WorkerInfo> {
        let mut workers = self.workers.write().await;
        let stored = match workers.get(&worker.id) {
            Some(existing) => WorkerInfo {
                registered_at: existing.registered_at,
                tasks_completed: existing.tasks_completed,
                tasks_failed: existing.tasks_failed,
                ..worker.clone()
            },
            None => worker.clone(),
        };
        workers.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: &str) -> SwarmResult<Option<WorkerInfo>> {
        Ok(self.workers.read().await.get(id).cloned())
    }

    async fn list(&self) -> SwarmResult<Vec<WorkerInfo>> {
        let mut workers: Vec<_> = self.workers.read().await.values().cloned().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workers)
    }

    async fn touch_heartbeat(
        &self,
        id: &str,
        at: DateTime<Utc>,
        active_tasks: Option<u32>,
    ) -> SwarmResult<bool> {
        let mut workers = self.workers.write().await;
        let Some(worker) = workers.get_mut(id) else {
            return Ok(false);
        };
        worker.last_heartbeat = at;
        worker.status = WorkerStatus::Active;
        if let Some(active) = active_tasks {
            worker.active_tasks = active;
        }
        Ok(true)
    }

    async fn update_status(&self, id: &str, status: WorkerStatus) -> SwarmResult<()> {
        self.update(id, |w| w.status = status).await
    }

    async fn increment_completed(&self, id: &str) -> SwarmResult<()> {
        self.update(id, |w| w.tasks_completed += 1).await
    }

    async fn increment_failed(&self, id: &str) -> SwarmResult<()> {
        self.update(id, |w| w.tasks_failed += 1).await
    }

    async fn remove(&self, id: &str) -> SwarmResult<bool> {
        Ok(self.workers.write().await.remove(id).is_some())
    }

    async fn clear(&self) -> SwarmResult<u64> {
        let mut workers = self.workers.write().await;
        let count = workers.len() as u64;
        workers.clear();
        Ok(count)
    }
}
