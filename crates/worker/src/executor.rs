use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, warn};

use swarm_core::{
    models::CATALOG_VERSION,
    protocol::{ResultsPayload, SubmitResultsRequest, WorkItem},
    traits::InferenceBackend,
};

use crate::prompts::build_prompt;

/// Responses shorter than this are treated as truncated.
const MIN_RESPONSE_CHARS: usize = 10;

/// What to send back to the dispatcher for one task.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed(SubmitResultsRequest),
    /// Every component failed; report the task instead of submitting error text.
    Failed { reason: String },
}

pub struct TaskExecutor {
    backend: Arc<dyn InferenceBackend>,
    worker_id: String,
}

impl TaskExecutor {
    pub fn new(backend: Arc<dyn InferenceBackend>, worker_id: impl Into<String>) -> Self {
        Self {
            backend,
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Generate every requested component in order.
    ///
    /// A failed component degrades to an error string so the rest of the task
    /// still lands.
    pub async fn execute(&self, item: &WorkItem) -> ExecutionOutcome {
        let started = Instant::now();
        let mut components = BTreeMap::new();
        let mut failures = Vec::new();

        for component in &item.components {
            let prompt = build_prompt(&item.record_data, *component);
            let content = match self.backend.generate(&prompt).await {
                Ok(text) if text.chars().count() < MIN_RESPONSE_CHARS => {
                    warn!("Short response for {} on {}", component, item.record_name);
                    format!("Analysis incomplete for {component}")
                }
                Ok(text) => text,
                Err(e) => {
                    warn!("Generation failed for {} on {}: {}", component, item.record_name, e);
                    failures.push(format!("{component}: {e}"));
                    format!("Analysis failed: {e}")
                }
            };
            components.insert(component.to_string(), content);
        }

        let elapsed = started.elapsed().as_secs_f64();
        if !item.components.is_empty() && failures.len() == item.components.len() {
            return ExecutionOutcome::Failed {
                reason: failures.join("; "),
            };
        }

        info!(
            "Generated {} components for {} in {:.1}s",
            components.len(),
            item.record_name,
            elapsed
        );
        debug!("Task {} produced {:?}", item.task_id, components.keys());

        ExecutionOutcome::Completed(SubmitResultsRequest {
            worker_id: self.worker_id.clone(),
            task_id: item.task_id.clone(),
            record_id: Some(item.record_id.clone()),
            results: ResultsPayload {
                components,
                model_info: json!({
                    "model": self.backend.model_name(),
                    "worker_id": self.worker_id,
                    "catalog_version": CATALOG_VERSION,
                }),
                execution_time: Some(elapsed),
            },
        })
    }
}
