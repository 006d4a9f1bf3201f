//! Worker与调度中心之间的HTTP协议。
//!
//! 字段名与JSON结构是对外契约，调度中心的handler与Worker客户端共用这些类型。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{ComponentType, RecordSummary, Task, WorkerCapabilities};

pub const STATUS_REGISTERED: &str = "registered";
pub const STATUS_SUCCESS: &str = "success";

fn default_max_tasks() -> u32 {
    1
}

/// `POST /register`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub capabilities: WorkerCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: String,
    pub worker_id: String,
    pub assigned_components: Vec<ComponentType>,
}

/// `POST /heartbeat`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active_tasks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: String,
}

/// `POST /get_work`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorkRequest {
    #[serde(default)]
    pub worker_id: String,
    /// 缺省为1，0表示不要任务，超过 `max_tasks_per_poll` 时按上限处理
    #[serde(default = "default_max_tasks")]
    pub max_tasks: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetWorkResponse {
    pub tasks: Vec<WorkItem>,
}

/// 下发给Worker的任务，包含推理所需的记录摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub task_id: String,
    pub record_id: String,
    pub record_name: String,
    pub components: Vec<ComponentType>,
    pub record_data: RecordSummary,
}

impl From<&Task> for WorkItem {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id.clone(),
            record_id: task.record_id.clone(),
            record_name: task.record_name.clone(),
            components: task.components.clone(),
            record_data: task.record_data.clone(),
        }
    }
}

/// `POST /submit_results`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitResultsRequest {
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub results: ResultsPayload,
}

/// 组件名保持为字符串，未知组件在合并时跳过而不是整体拒绝
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    #[serde(default)]
    pub model_info: serde_json::Value,
    #[serde(default)]
    pub execution_time: Option<f64>,
}

/// `POST /report_failure`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFailureRequest {
    #[serde(default)]
    pub worker_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub reason: String,
}

/// 提交结果与失败上报的通用应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: String,
    pub message: String,
}

impl AckResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
        }
    }
}
