mod record_repository;
mod task_repository;
mod worker_repository;

pub use record_repository::PostgresRecordRepository;
pub use task_repository::PostgresTaskRepository;
pub use worker_repository::PostgresWorkerRepository;

use swarm_core::models::ComponentType;
use tracing::warn;

/// 组件列表转为 TEXT[]
pub(crate) fn components_to_text(components: &[ComponentType]) -> Vec<String> {
    components.iter().map(|c| c.as_str().to_string()).collect()
}

/// TEXT[] 转为组件列表，目录中已不存在的组件被丢弃
pub(crate) fn components_from_text(values: Vec<String>) -> Vec<ComponentType> {
    values
        .into_iter()
        .filter_map(|v| match v.parse() {
            Ok(c) => Some(c),
            Err(_) => {
                warn!("忽略未知的组件类型: {}", v);
                None
            }
        })
        .collect()
}
