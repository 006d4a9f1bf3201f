//! 进程内仓储实现
//!
//! 所有状态保存在 `tokio::sync::RwLock` 保护的 `HashMap` 中，锁不会跨越任何外部调用。

mod record_repository;
mod task_repository;
mod worker_repository;

pub use record_repository::InMemoryRecordRepository;
pub use task_repository::InMemoryTaskRepository;
pub use worker_repository::InMemoryWorkerRepository;
