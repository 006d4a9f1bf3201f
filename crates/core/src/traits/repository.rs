use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{
        AnalysisRecord, ComponentEntry, ComponentType, RecordCounts, Task, TaskCounts, WorkerInfo,
        WorkerStatus,
    },
    SwarmResult,
};

/// 候选记录的排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrder {
    /// 按 `priority_rank` 升序
    RankAscending,
    /// 在满足条件的记录中均匀随机抽样
    Random,
}

/// 候选记录查询条件
///
/// 只返回带有 `priority_rank` 且 `component_count < below_component_count` 的记录。
/// `missing_any_of` 非空时，还要求记录至少缺少其中一个组件，
/// 排序窗口因此不会被当前Worker无法补全的记录占满。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateQuery<'a> {
    pub below_component_count: u32,
    pub missing_any_of: &'a [ComponentType],
    pub order: CandidateOrder,
    pub limit: usize,
}

/// 分析记录仓储
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// 插入或整体覆盖记录，供数据导入方使用
    async fn upsert(&self, record: &AnalysisRecord) -> SwarmResult<()>;

    async fn get_by_id(&self, id: &str) -> SwarmResult<Option<AnalysisRecord>>;

    async fn get_by_alternate_id(&self, alternate_id: &str) -> SwarmResult<Option<AnalysisRecord>>;

    /// 按名称精确匹配
    async fn get_by_name(&self, name: &str) -> SwarmResult<Option<AnalysisRecord>>;

    /// 批量读取，结果顺序与输入一致，不存在的id被忽略
    async fn get_many(&self, ids: &[String]) -> SwarmResult<Vec<AnalysisRecord>>;

    /// 只读查询候选记录
    async fn find_candidates(&self, query: &CandidateQuery<'_>) -> SwarmResult<Vec<AnalysisRecord>>;

    /// 逐键写入组件并重新计算 `component_count` 与 `fully_analyzed`
    ///
    /// 单条记录内原子执行，返回更新后的记录；记录不存在时返回 `None`。
    async fn merge_components(
        &self,
        record_id: &str,
        components: &BTreeMap<ComponentType, ComponentEntry>,
        completion_threshold: u32,
    ) -> SwarmResult<Option<AnalysisRecord>>;

    /// 按当前阈值重新计算所有记录的完成状态，返回被修正的记录数
    async fn recompute_completion(&self, completion_threshold: u32) -> SwarmResult<u64>;

    async fn counts(&self) -> SwarmResult<RecordCounts>;
}

/// Worker仓储
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// 按id插入或更新；已存在的Worker保留注册时间与计数器
    async fn upsert(&self, worker: &WorkerInfo) -> SwarmResult<WorkerInfo>;

    async fn get_by_id(&self, id: &str) -> SwarmResult<Option<WorkerInfo>>;

    async fn list(&self) -> SwarmResult<Vec<WorkerInfo>>;

    /// 刷新心跳并恢复为活跃状态，Worker不存在时返回 `false`
    async fn touch_heartbeat(
        &self,
        id: &str,
        at: DateTime<Utc>,
        active_tasks: Option<u32>,
    ) -> SwarmResult<bool>;

    async fn update_status(&self, id: &str, status: WorkerStatus) -> SwarmResult<()>;

    async fn increment_completed(&self, id: &str) -> SwarmResult<()>;

    async fn increment_failed(&self, id: &str) -> SwarmResult<()>;

    /// 删除单个Worker，返回是否存在
    async fn remove(&self, id: &str) -> SwarmResult<bool>;

    /// 删除所有Worker，返回删除数量
    async fn clear(&self) -> SwarmResult<u64>;
}

/// 任务仓储
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> SwarmResult<()>;

    async fn get_by_id(&self, task_id: &str) -> SwarmResult<Option<Task>>;

    /// 标记完成；返回本次调用是否完成了状态转换
    async fn complete(
        &self,
        task_id: &str,
        at: DateTime<Utc>,
        execution_time: Option<f64>,
    ) -> SwarmResult<bool>;

    async fn mark_failed(&self, task_id: &str, at: DateTime<Utc>, reason: &str)
        -> SwarmResult<()>;

    /// 清空 `assigned_before` 之前分配且仍未完成任务的归属，返回被回收的任务
    async fn release_expired(&self, assigned_before: DateTime<Utc>) -> SwarmResult<Vec<Task>>;

    /// 清空某个Worker所有未完成任务的归属
    async fn release_worker_tasks(&self, worker_id: &str) -> SwarmResult<u64>;

    /// 可重新分配的任务，按创建时间升序
    async fn find_recyclable(&self, limit: usize) -> SwarmResult<Vec<Task>>;

    /// 条件重新分配：仅当任务仍可回收时生效，返回是否成功
    async fn reassign(
        &self,
        task_id: &str,
        worker_id: &str,
        components: &[ComponentType],
        at: DateTime<Utc>,
    ) -> SwarmResult<bool>;

    /// 某条记录上仍在处理中的组件
    async fn in_flight_components(&self, record_id: &str) -> SwarmResult<BTreeSet<ComponentType>>;

    /// 删除所有处于 assigned 状态的任务，已完成和已失败的任务保留，返回删除数量
    async fn delete_assigned(&self) -> SwarmResult<u64>;

    async fn counts(&self) -> SwarmResult<TaskCounts>;
}
