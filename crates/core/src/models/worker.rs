use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{CapabilityTier, ComponentType, WorkerCapabilities};

/// Worker节点信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: String,
    pub capabilities: WorkerCapabilities,
    pub tier: CapabilityTier,
    /// 注册时由能力路由计算出的组件集合
    pub assigned_components: Vec<ComponentType>,
    pub status: WorkerStatus,
    pub active_tasks: u32,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

/// Worker状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Active,
    /// 心跳超时，仅作为健康提示，不会注销Worker
    Stale,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Stale => "stale",
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for WorkerStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for WorkerStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "active" => Ok(WorkerStatus::Active),
            "stale" => Ok(WorkerStatus::Stale),
            _ => Err(format!("Invalid worker status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for WorkerStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl WorkerInfo {
    /// 创建新注册的Worker
    pub fn new(
        id: impl Into<String>,
        capabilities: WorkerCapabilities,
        tier: CapabilityTier,
        assigned_components: Vec<ComponentType>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            capabilities,
            tier,
            assigned_components,
            status: WorkerStatus::Active,
            active_tasks: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            last_heartbeat: now,
            registered_at: now,
        }
    }

    /// 距上次心跳是否超过给定窗口
    pub fn is_stale_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_heartbeat > window
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_window_is_exclusive() {
        let now = Utc::now();
        let mut worker = WorkerInfo::new(
            "w-1",
            WorkerCapabilities::default(),
            CapabilityTier::Balanced,
            vec![],
            now,
        );

        let window = Duration::minutes(5);
        assert!(!worker.is_stale_at(now + Duration::minutes(5), window));
        assert!(worker.is_stale_at(now + Duration::minutes(5) + Duration::seconds(1), window));

        worker.last_heartbeat = now + Duration::minutes(4);
        assert!(!worker.is_stale_at(now + Duration::minutes(8), window));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&WorkerStatus::Stale).unwrap(), "\"stale\"");
    }
}
