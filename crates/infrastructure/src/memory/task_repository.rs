use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use swarm_core::{
    models::{ComponentType, Task, TaskCounts, TaskStatus},
    traits::TaskRepository,
    SwarmError, SwarmResult,
};

/// 内存任务仓储
#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部任务快照，按创建时间排序
    pub async fn snapshot(&self) -> Vec<Task> {
        let mut tasks: Vec<_> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> SwarmResult<()> {
        self.tasks
            .write()
            .await
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn get_by_id(&self, task_id: &str) -> SwarmResult<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn complete(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
        execution_time: Option<f64>,
    ) -> SwarmResult<bool> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id).ok_or_else(|| SwarmError::TaskNotFound {
            id: task_id.to_string(),
        })?;

        if task.status == TaskStatus::Completed {
            return Ok(false);
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(at);
        task.execution_time = execution_time;
        Ok(true)
    }

    async fn mark_failed(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> SwarmResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id).ok_or_else(|| SwarmError::TaskNotFound {
            id: task_id.to_string(),
        })?;

        task.status = TaskStatus::Failed;
        task.completed_at = Some(at);
        task.failure_reason = Some(reason.to_string());
        Ok(())
    }

    async fn release_expired(&self, assigned_before: DateTime<Utc>) -> SwarmResult<Vec<Task>> {
        let mut tasks = self.tasks.write().await;
        let mut released = Vec::new();
        for task in tasks.values_mut() {
            if task.is_in_flight() && task.assigned_at < assigned_before {
                task.assigned_to = None;
                released.push(task.clone());
            }
        }
        Ok(released)
    }

    async fn release_worker_tasks(&self, worker_id: &str) -> SwarmResult<u64> {
        let mut tasks = self.tasks.write().await;
        let mut released = 0;
        for task in tasks.values_mut() {
            if task.is_in_flight() && task.is_owned_by(worker_id) {
                task.assigned_to = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn find_recyclable(&self, limit: usize) -> SwarmResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut recyclable: Vec<_> = tasks.values().filter(|t| t.is_recyclable()).cloned().collect();
        recyclable.sort_by_key(|t| t.created_at);
        recyclable.truncate(limit);
        Ok(recyclable)
    }

    async fn reassign(
        &self,
        task_id: &str,
        worker_id: &str,
        components: &[ComponentType],
        at: DateTime<Utc>,
    ) -> SwarmResult<bool> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(task_id) else {
            return Ok(false);
        };
        if !task.is_recyclable() {
            return Ok(false);
        }

        task.assigned_to = Some(worker_id.to_string());
        task.components = components.to_vec();
        task.status = TaskStatus::Assigned;
        task.assigned_at = at;
        task.completed_at = None;
        task.failure_reason = None;
        task.reassign_count += 1;
        Ok(true)
    }

    async fn in_flight_components(&self, record_id: &str) -> SwarmResult<BTreeSet<ComponentType>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| t.record_id == record_id && t.is_in_flight())
            .flat_map(|t| t.components.iter().copied())
            .collect())
    }

    async fn delete_assigned(&self) -> SwarmResult<u64> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| t.status != TaskStatus::Assigned);
        Ok((before - tasks.len()) as u64)
    }

    async fn counts(&self) -> SwarmResult<TaskCounts> {
        let tasks = self.tasks.read().await;
        let mut counts = TaskCounts::default();
        for task in tasks.values() {
            match task.status {
                TaskStatus::Assigned => counts.assigned += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}
