use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ComponentType, RecordSummary};

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Assigned,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Assigned => "assigned",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for TaskStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TaskStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "assigned" => Ok(TaskStatus::Assigned),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TaskStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 分配给单个Worker的一批缺失组件
///
/// `assigned_to` 为空且状态为 `Assigned` 表示任务已被回收，等待重新分配。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub record_id: String,
    pub record_name: String,
    pub record_data: RecordSummary,
    pub assigned_to: Option<String>,
    pub components: Vec<ComponentType>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time: Option<f64>,
    pub failure_reason: Option<String>,
    pub reassign_count: u32,
}

impl Task {
    pub fn new(
        record_id: impl Into<String>,
        record_data: RecordSummary,
        worker_id: impl Into<String>,
        components: Vec<ComponentType>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            record_id: record_id.into(),
            record_name: record_data.name.clone(),
            record_data,
            assigned_to: Some(worker_id.into()),
            components,
            status: TaskStatus::Assigned,
            created_at: now,
            assigned_at: now,
            completed_at: None,
            execution_time: None,
            failure_reason: None,
            reassign_count: 0,
        }
    }

    pub fn is_owned_by(&self, worker_id: &str) -> bool {
        self.assigned_to.as_deref() == Some(worker_id)
    }

    /// 已分配且仍有归属的任务
    pub fn is_in_flight(&self) -> bool {
        self.status == TaskStatus::Assigned && self.assigned_to.is_some()
    }

    /// 失败或被回收的任务可重新分配
    pub fn is_recyclable(&self) -> bool {
        match self.status {
            TaskStatus::Failed => true,
            TaskStatus::Assigned => self.assigned_to.is_none(),
            TaskStatus::Completed => false,
        }
    }

    /// 已分配时间超过超时阈值
    pub fn is_expired_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.is_in_flight() && now - self.assigned_at > timeout
    }
}
