use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tracing::debug;

use swarm_core::{
    models::{ComponentType, RecordSummary, Task, TaskCounts, TaskStatus},
    traits::TaskRepository,
    SwarmError, SwarmResult,
};

use super::{components_from_text, components_to_text};

const TASK_COLUMNS: &str = "task_id, record_id, record_name, record_data, assigned_to, components, \
     status, created_at, assigned_at, completed_at, execution_time, failure_reason, reassign_count";

/// 可回收条件：失败，或已分配但归属被清空
const RECYCLABLE: &str = "(status = 'failed' OR (status = 'assigned' AND assigned_to IS NULL))";

/// PostgreSQL任务仓储
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &PgRow) -> SwarmResult<Task> {
        let record_data: Json<RecordSummary> = row.try_get("record_data")?;
        let components: Vec<String> = row.try_get("components")?;
        let reassign_count: i32 = row.try_get("reassign_count")?;

        Ok(Task {
            task_id: row.try_get("task_id")?,
            record_id: row.try_get("record_id")?,
            record_name: row.try_get("record_name")?,
            record_data: record_data.0,
            assigned_to: row.try_get("assigned_to")?,
            components: components_from_text(components),
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            assigned_at: row.try_get("assigned_at")?,
            completed_at: row.try_get("completed_at")?,
            execution_time: row.try_get("execution_time")?,
            failure_reason: row.try_get("failure_reason")?,
            reassign_count: reassign_count.max(0) as u32,
        })
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn create(&self, task: &Task) -> SwarmResult<()> {
        let sql = format!(
            "INSERT INTO tasks ({TASK_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        );

        sqlx::query(&sql)
            .bind(&task.task_id)
            .bind(&task.record_id)
            .bind(&task.record_name)
            .bind(Json(&task.record_data))
            .bind(&task.assigned_to)
            .bind(components_to_text(&task.components))
            .bind(task.status)
            .bind(task.created_at)
            .bind(task.assigned_at)
            .bind(task.completed_at)
            .bind(task.execution_time)
            .bind(&task.failure_reason)
            .bind(task.reassign_count as i32)
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        debug!("创建任务: {} -> {}", task.task_id, task.record_id);
        Ok(())
    }

    async fn get_by_id(&self, task_id: &str) -> SwarmResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = $1");
        let row = sqlx::query(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn complete(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
        execution_time: Option<f64>,
    ) -> SwarmResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'completed', completed_at = $2, execution_time = $3
            WHERE task_id = $1 AND status <> 'completed'
            "#,
        )
        .bind(task_id)
        .bind(at)
        .bind(execution_time)
        .execute(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.get_by_id(task_id).await? {
            Some(_) => Ok(false),
            None => Err(SwarmError::TaskNotFound {
                id: task_id.to_string(),
            }),
        }
    }

    async fn mark_failed(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> SwarmResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = 'failed', completed_at = $2, failure_reason = $3 WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        if result.rows_affected() == 0 {
            return Err(SwarmError::TaskNotFound {
                id: task_id.to_string(),
            });
        }
        Ok(())
    }

    async fn release_expired(&self, assigned_before: DateTime<Utc>) -> SwarmResult<Vec<Task>> {
        let sql = format!(
            "UPDATE tasks SET assigned_to = NULL \
             WHERE status = 'assigned' AND assigned_to IS NOT NULL AND assigned_at < $1 \
             RETURNING {TASK_COLUMNS}"
        );
        let rows = sqlx::query(&sql)
            .bind(assigned_before)
            .fetch_all(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn release_worker_tasks(&self, worker_id: &str) -> SwarmResult<u64> {
        let result = sqlx::query(
            "UPDATE tasks SET assigned_to = NULL WHERE status = 'assigned' AND assigned_to = $1",
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        Ok(result.rows_affected())
    }

    async fn find_recyclable(&self, limit: usize) -> SwarmResult<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE {RECYCLABLE} ORDER BY created_at ASC LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn reassign(
        &self,
        task_id: &str,
        worker_id: &str,
        components: &[ComponentType],
        at: DateTime<Utc>,
    ) -> SwarmResult<bool> {
        let sql = format!(
            r#"
            UPDATE tasks SET
                assigned_to = $2,
                components = $3,
                status = 'assigned',
                assigned_at = $4,
                completed_at = NULL,
                failure_reason = NULL,
                reassign_count = reassign_count + 1
            WHERE task_id = $1 AND {RECYCLABLE}
            "#
        );
        let result = sqlx::query(&sql)
            .bind(task_id)
            .bind(worker_id)
            .bind(components_to_text(components))
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn in_flight_components(&self, record_id: &str) -> SwarmResult<BTreeSet<ComponentType>> {
        let rows = sqlx::query(
            "SELECT components FROM tasks \
             WHERE record_id = $1 AND status = 'assigned' AND assigned_to IS NOT NULL",
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        let mut in_flight = BTreeSet::new();
        for row in &rows {
            let components: Vec<String> = row.try_get("components")?;
            in_flight.extend(components_from_text(components));
        }
        Ok(in_flight)
    }

    async fn delete_assigned(&self) -> SwarmResult<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE status = 'assigned'")
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        Ok(result.rows_affected())
    }

    async fn counts(&self) -> SwarmResult<TaskCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'assigned') AS assigned,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM tasks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        let assigned: i64 = row.try_get("assigned")?;
        let completed: i64 = row.try_get("completed")?;
        let failed: i64 = row.try_get("failed")?;
        Ok(TaskCounts {
            assigned: assigned as u64,
            completed: completed as u64,
            failed: failed as u64,
        })
    }
}

