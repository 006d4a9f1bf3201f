#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use swarm_core::{
    config::DispatcherConfig,
    models::{AnalysisRecord, ComponentEntry, ComponentType, RecordData, Task, WorkerCapabilities},
    protocol::{ResultsPayload, SubmitResultsRequest},
};
use swarm_dispatcher::SwarmDispatcher;
use swarm_infrastructure::{
    InMemoryRecordRepository, InMemoryTaskRepository, InMemoryWorkerRepository, MetricsCollector,
    Repositories,
};

pub struct Harness {
    pub swarm: SwarmDispatcher,
    pub records: Arc<InMemoryRecordRepository>,
    pub workers: Arc<InMemoryWorkerRepository>,
    pub tasks: Arc<InMemoryTaskRepository>,
}

impl Harness {
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        Self::with_config(records, DispatcherConfig::default())
    }

    pub fn with_config(records: Vec<AnalysisRecord>, config: DispatcherConfig) -> Self {
        let records = Arc::new(InMemoryRecordRepository::with_records(records));
        let workers = Arc::new(InMemoryWorkerRepository::new());
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let repositories = Repositories {
            records: records.clone(),
            workers: workers.clone(),
            tasks: tasks.clone(),
        };
        let swarm = SwarmDispatcher::new(repositories, &config, Arc::new(MetricsCollector::new()));
        Self {
            swarm,
            records,
            workers,
            tasks,
        }
    }

    pub async fn register_balanced(&self, id: &str) {
        self.swarm
            .registry
            .register(id, WorkerCapabilities::new(false, 16, 8))
            .await
            .unwrap();
    }

    pub async fn register_fast(&self, id: &str) {
        self.swarm
            .registry
            .register(id, WorkerCapabilities::new(true, 64, 16))
            .await
            .unwrap();
    }

    pub async fn record(&self, id: &str) -> AnalysisRecord {
        use swarm_core::traits::RecordRepository;
        self.records.get_by_id(id).await.unwrap().unwrap()
    }
}

pub fn card(id: &str, rank: Option<i64>) -> AnalysisRecord {
    AnalysisRecord::new(
        id,
        format!("Card {id}"),
        RecordData {
            type_line: Some("Creature — Elf Druid".into()),
            oracle_text: Some("{T}: Add {G}.".into()),
            ..Default::default()
        },
        rank,
    )
}

/// 预先填好指定组件的记录
pub fn card_with(id: &str, rank: Option<i64>, present: &[ComponentType]) -> AnalysisRecord {
    let mut record = card(id, rank);
    let entries: BTreeMap<_, _> = present
        .iter()
        .map(|c| {
            (
                *c,
                ComponentEntry {
                    content: format!("existing {c}"),
                    generated_at: chrono::Utc::now(),
                    generated_by: "seed".into(),
                    model_info: serde_json::Value::Null,
                },
            )
        })
        .collect();
    record.apply_components(&entries, 20, chrono::Utc::now());
    record
}

/// 为任务中的每个组件生成内容
pub fn submission_for(task: &Task, worker_id: &str) -> SubmitResultsRequest {
    let components = task
        .components
        .iter()
        .map(|c| (c.to_string(), format!("{} analysis for {}", c, task.record_name)))
        .collect();
    SubmitResultsRequest {
        worker_id: worker_id.to_string(),
        task_id: task.task_id.clone(),
        record_id: Some(task.record_id.clone()),
        results: ResultsPayload {
            components,
            model_info: serde_json::json!({"model": "test-model"}),
            execution_time: Some(1.5),
        },
    }
}
