use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use tracing::debug;

use swarm_core::{
    models::{WorkerCapabilities, WorkerInfo, WorkerStatus},
    traits::WorkerRepository,
    SwarmError, SwarmResult,
};

use super::{components_from_text, components_to_text};

const WORKER_COLUMNS: &str = "id, capabilities, tier, assigned_components, status, active_tasks, \
     tasks_completed, tasks_failed, last_heartbeat, registered_at";

/// PostgreSQL Worker仓储实现
pub struct PostgresWorkerRepository {
    pool: PgPool,
}

impl PostgresWorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 将数据库行转换为WorkerInfo模型
    fn row_to_worker_info(row: &PgRow) -> SwarmResult<WorkerInfo> {
        let capabilities: Json<WorkerCapabilities> = row.try_get("capabilities")?;
        let tier: String = row.try_get("tier")?;
        let assigned: Vec<String> = row.try_get("assigned_components")?;
        let active_tasks: i32 = row.try_get("active_tasks")?;
        let tasks_completed: i64 = row.try_get("tasks_completed")?;
        let tasks_failed: i64 = row.try_get("tasks_failed")?;

        Ok(WorkerInfo {
            id: row.try_get("id")?,
            capabilities: capabilities.0,
            tier: tier.parse()?,
            assigned_components: components_from_text(assigned),
            status: row.try_get("status")?,
            active_tasks: active_tasks.max(0) as u32,
            tasks_completed: tasks_completed.max(0) as u64,
            tasks_failed: tasks_failed.max(0) as u64,
            last_heartbeat: row.try_get("last_heartbeat")?,
            registered_at: row.try_get("registered_at")?,
        })
    }

    async fn execute_for(&self, sql: &str, id: &str) -> SwarmResult<()> {
        let result = sqlx::query(sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        if result.rows_affected() == 0 {
            return Err(SwarmError::WorkerNotFound { id: id.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerRepository for PostgresWorkerRepository {
    async fn upsert(&self, worker: &WorkerInfo) -> SwarmResult<WorkerInfo> {
        let sql = format!(
            r#"
            INSERT INTO workers ({WORKER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                capabilities = EXCLUDED.capabilities,
                tier = EXCLUDED.tier,
                assigned_components = EXCLUDED.assigned_components,
                status = EXCLUDED.status,
                active_tasks = EXCLUDED.active_tasks,
                last_heartbeat = EXCLUDED.last_heartbeat
            RETURNING {WORKER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&worker.id)
            .bind(Json(&worker.capabilities))
            .bind(worker.tier.as_str())
            .bind(components_to_text(&worker.assigned_components))
            .bind(worker.status)
            .bind(worker.active_tasks as i32)
            .bind(worker.tasks_completed as i64)
            .bind(worker.tasks_failed as i64)
            .bind(worker.last_heartbeat)
            .bind(worker.registered_at)
            .fetch_one(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        debug!("注册Worker成功: {}", worker.id);
        Self::row_to_worker_info(&row)
    }

    async fn get_by_id(&self, id: &str) -> SwarmResult<Option<WorkerInfo>> {
        let sql = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        row.as_ref().map(Self::row_to_worker_info).transpose()
    }

    async fn list(&self) -> SwarmResult<Vec<WorkerInfo>> {
        let sql = format!("SELECT {WORKER_COLUMNS} FROM workers ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        rows.iter().map(Self::row_to_worker_info).collect()
    }

    async fn touch_heartbeat(
        &self,
        id: &str,
        at: DateTime<Utc>,
        active_tasks: Option<u32>,
    ) -> SwarmResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET last_heartbeat = $2,
                status = 'active',
                active_tasks = COALESCE($3, active_tasks)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(active_tasks.map(|n| n as i32))
        .execute(&self.pool)
        .await
        .map_err(SwarmError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, id: &str, status: WorkerStatus) -> SwarmResult<()> {
        let result = sqlx::query("UPDATE workers SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        if result.rows_affected() == 0 {
            return Err(SwarmError::WorkerNotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn increment_completed(&self, id: &str) -> SwarmResult<()> {
        self.execute_for(
            "UPDATE workers SET tasks_completed = tasks_completed + 1 WHERE id = $1",
            id,
        )
        .await
    }

    async fn increment_failed(&self, id: &str) -> SwarmResult<()> {
        self.execute_for(
            "UPDATE workers SET tasks_failed = tasks_failed + 1 WHERE id = $1",
            id,
        )
        .await
    }

    async fn remove(&self, id: &str) -> SwarmResult<bool> {
        let result = sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        debug!("注销Worker: {}", id);
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> SwarmResult<u64> {
        let result = sqlx::query("DELETE FROM workers")
            .execute(&self.pool)
            .await
            .map_err(SwarmError::Database)?;

        Ok(result.rows_affected())
    }
}
