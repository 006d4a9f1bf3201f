use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use swarm_core::{
    models::{AnalysisRecord, ComponentEntry, ComponentType, Task, TaskStatus},
    protocol::SubmitResultsRequest,
    traits::{RecordRepository, TaskRepository, WorkerRepository},
    SwarmError, SwarmResult,
};
use swarm_infrastructure::MetricsCollector;

const PLACEHOLDER_CONTENT: &str = "placeholder";

/// 一次提交的处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub task_id: String,
    pub record_id: String,
    pub merged: Vec<ComponentType>,
    /// 被跳过的组件名（占位内容或未知组件）
    pub skipped: Vec<String>,
    pub component_count: u32,
    pub fully_analyzed: bool,
    /// 本次调用是否把任务从未完成变为完成
    pub newly_completed: bool,
}

impl SubmitOutcome {
    pub fn message(&self) -> String {
        let mut message = format!(
            "已合并 {} 个组件，记录 {} 当前共 {} 个组件",
            self.merged.len(),
            self.record_id,
            self.component_count
        );
        if !self.skipped.is_empty() {
            message.push_str(&format!("，跳过 {} 个", self.skipped.len()));
        }
        if self.fully_analyzed {
            message.push_str("，分析已完成");
        }
        message
    }
}

/// 结果合并器
///
/// 按组件键逐个覆盖写入，组件数量从组件表重新计算，重复提交同一结果不会改变最终状态。
pub struct ResultMerger {
    task_repo: Arc<dyn TaskRepository>,
    record_repo: Arc<dyn RecordRepository>,
    worker_repo: Arc<dyn WorkerRepository>,
    completion_threshold: u32,
    metrics: Arc<MetricsCollector>,
}

impl ResultMerger {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        record_repo: Arc<dyn RecordRepository>,
        worker_repo: Arc<dyn WorkerRepository>,
        completion_threshold: u32,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            task_repo,
            record_repo,
            worker_repo,
            completion_threshold,
            metrics,
        }
    }

    pub async fn submit_results(&self, request: &SubmitResultsRequest) -> SwarmResult<SubmitOutcome> {
        let worker_id = request.worker_id.trim();
        let task_id = request.task_id.trim();
        if worker_id.is_empty() || task_id.is_empty() {
            return Err(SwarmError::Validation(
                "worker_id和task_id不能为空".to_string(),
            ));
        }

        let task = self.load_owned_task(task_id, worker_id).await?;
        let record = self.resolve_record(&task, request.record_id.as_deref()).await?;

        let now = Utc::now();
        let (entries, skipped) = self.build_entries(request, worker_id, now);

        let (component_count, fully_analyzed) = if entries.is_empty() {
            (record.component_count, record.fully_analyzed)
        } else {
            let merged = self
                .record_repo
                .merge_components(&record.id, &entries, self.completion_threshold)
                .await?
                .ok_or_else(|| SwarmError::RecordNotFound {
                    id: record.id.clone(),
                })?;
            (merged.component_count, merged.fully_analyzed)
        };

        let newly_completed = self
            .task_repo
            .complete(&task.task_id, now, request.results.execution_time)
            .await?;
        if newly_completed {
            match self.worker_repo.increment_completed(worker_id).await {
                Ok(()) => {}
                // Worker已被管理员移除，记录结果仍然有效
                Err(SwarmError::WorkerNotFound { .. }) => {
                    warn!("提交结果的Worker {} 已不存在，跳过计数", worker_id);
                }
                Err(e) => return Err(e),
            }
        }

        let merged: Vec<ComponentType> = entries.keys().copied().collect();
        self.metrics.record_result_merged(merged.len(), skipped.len());
        info!(
            "Worker {} 提交任务 {}: 合并 {} 个组件，记录 {} 共 {} 个组件{}",
            worker_id,
            task.task_id,
            merged.len(),
            record.id,
            component_count,
            if fully_analyzed { "（已完成）" } else { "" }
        );

        Ok(SubmitOutcome {
            task_id: task.task_id,
            record_id: record.id,
            merged,
            skipped,
            component_count,
            fully_analyzed,
            newly_completed,
        })
    }

    /// Worker主动报告任务失败，任务进入failed状态等待重新分配
    pub async fn report_failure(&self, task_id: &str, worker_id: &str, reason: &str) -> SwarmResult<()> {
        let worker_id = worker_id.trim();
        let task_id = task_id.trim();
        if worker_id.is_empty() || task_id.is_empty() {
            return Err(SwarmError::Validation(
                "worker_id和task_id不能为空".to_string(),
            ));
        }

        let task = self.load_owned_task(task_id, worker_id).await?;
        if task.status == TaskStatus::Completed {
            return Err(SwarmError::Validation(format!(
                "任务 {} 已完成，不能标记为失败",
                task_id
            )));
        }

        self.task_repo.mark_failed(task_id, Utc::now(), reason).await?;
        match self.worker_repo.increment_failed(worker_id).await {
            Ok(()) | Err(SwarmError::WorkerNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        self.metrics.record_task_failed();
        warn!("Worker {} 报告任务 {} 失败: {}", worker_id, task_id, reason);
        Ok(())
    }

    async fn load_owned_task(&self, task_id: &str, worker_id: &str) -> SwarmResult<Task> {
        let Some(task) = self.task_repo.get_by_id(task_id).await? else {
            self.metrics.record_submission_rejected("task_not_found");
            return Err(SwarmError::TaskNotFound {
                id: task_id.to_string(),
            });
        };

        if !task.is_owned_by(worker_id) {
            self.metrics.record_submission_rejected("forbidden");
            warn!(
                "拒绝Worker {} 对任务 {} 的提交，当前归属: {:?}",
                worker_id, task_id, task.assigned_to
            );
            return Err(SwarmError::Forbidden {
                task_id: task_id.to_string(),
                worker_id: worker_id.to_string(),
            });
        }
        Ok(task)
    }

    /// 依次按id、备用id、名称查找目标记录
    ///
    /// 先用任务上的记录id，再用提交中不同的记录id，每个标识都先查主键再查备用id。
    async fn resolve_record(
        &self,
        task: &Task,
        submitted_record_id: Option<&str>,
    ) -> SwarmResult<AnalysisRecord> {
        let mut identifiers = vec![task.record_id.as_str()];
        if let Some(submitted) = submitted_record_id.filter(|id| *id != task.record_id) {
            identifiers.push(submitted);
        }

        for identifier in identifiers {
            if let Some(record) = self.record_repo.get_by_id(identifier).await? {
                return Ok(record);
            }
            if let Some(record) = self.record_repo.get_by_alternate_id(identifier).await? {
                debug!("记录 {} 通过备用id匹配到 {}", identifier, record.id);
                return Ok(record);
            }
        }

        if let Some(record) = self.record_repo.get_by_name(&task.record_name).await? {
            debug!(
                "记录 {} 通过名称 {} 匹配到 {}",
                task.record_id, task.record_name, record.id
            );
            return Ok(record);
        }

        self.metrics.record_submission_rejected("record_not_found");
        Err(SwarmError::RecordNotFound {
            id: task.record_id.clone(),
        })
    }

    fn build_entries(
        &self,
        request: &SubmitResultsRequest,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> (BTreeMap<ComponentType, ComponentEntry>, Vec<String>) {
        let mut entries = BTreeMap::new();
        let mut skipped = Vec::new();

        for (name, content) in &request.results.components {
            let Ok(component) = name.parse::<ComponentType>() else {
                warn!("跳过未知组件: {}", name);
                skipped.push(name.clone());
                continue;
            };
            if is_placeholder(content) {
                debug!("跳过占位内容: {}", name);
                skipped.push(name.clone());
                continue;
            }

            entries.insert(
                component,
                ComponentEntry {
                    content: content.clone(),
                    generated_at: now,
                    generated_by: worker_id.to_string(),
                    model_info: request.results.model_info.clone(),
                },
            );
        }
        (entries, skipped)
    }
}

fn is_placeholder(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(PLACEHOLDER_CONTENT)
}
