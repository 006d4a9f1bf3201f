use std::time::Duration;

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use swarm_core::{
    config::WorkerConfig,
    models::WorkerCapabilities,
    protocol::{
        AckResponse, GetWorkRequest, GetWorkResponse, HeartbeatRequest, HeartbeatResponse,
        RegisterRequest, RegisterResponse, ReportFailureRequest, SubmitResultsRequest, WorkItem,
    },
    SwarmError, SwarmResult,
};

/// Per-call request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub register: Duration,
    pub heartbeat: Duration,
    pub get_work: Duration,
    pub submit: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for ClientTimeouts {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            register: Duration::from_secs(config.register_timeout_seconds),
            heartbeat: Duration::from_secs(config.heartbeat_timeout_seconds),
            get_work: Duration::from_secs(config.get_work_timeout_seconds),
            submit: Duration::from_secs(config.submit_timeout_seconds),
        }
    }
}

/// Which resource a 404 refers to for a given call.
#[derive(Clone, Copy)]
enum Subject<'a> {
    Worker(&'a str),
    Task(&'a str),
}

/// HTTP client for the dispatcher control surface.
pub struct DispatcherClient {
    base_url: String,
    http_client: reqwest::Client,
    timeouts: ClientTimeouts,
}

impl DispatcherClient {
    pub fn new(base_url: impl Into<String>, timeouts: ClientTimeouts) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeouts,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.dispatcher_url.clone(), ClientTimeouts::from(config))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(
        &self,
        worker_id: &str,
        capabilities: &WorkerCapabilities,
    ) -> SwarmResult<RegisterResponse> {
        let request = RegisterRequest {
            worker_id: worker_id.to_string(),
            capabilities: capabilities.clone(),
        };
        self.post(
            "/register",
            &request,
            self.timeouts.register,
            Subject::Worker(worker_id),
        )
        .await
    }

    /// A 404 means the dispatcher forgot this worker and it must register again.
    pub async fn heartbeat(
        &self,
        worker_id: &str,
        status: &str,
        active_tasks: u32,
    ) -> SwarmResult<HeartbeatResponse> {
        let request = HeartbeatRequest {
            worker_id: worker_id.to_string(),
            status: Some(status.to_string()),
            active_tasks,
        };
        self.post(
            "/heartbeat",
            &request,
            self.timeouts.heartbeat,
            Subject::Worker(worker_id),
        )
        .await
    }

    pub async fn get_work(&self, worker_id: &str, max_tasks: u32) -> SwarmResult<Vec<WorkItem>> {
        let request = GetWorkRequest {
            worker_id: worker_id.to_string(),
            max_tasks,
        };
        let response: GetWorkResponse = self
            .post(
                "/get_work",
                &request,
                self.timeouts.get_work,
                Subject::Worker(worker_id),
            )
            .await?;
        Ok(response.tasks)
    }

    pub async fn submit_results(&self, request: &SubmitResultsRequest) -> SwarmResult<AckResponse> {
        self.post(
            "/submit_results",
            request,
            self.timeouts.submit,
            Subject::Task(&request.task_id),
        )
        .await
    }

    pub async fn report_failure(
        &self,
        worker_id: &str,
        task_id: &str,
        reason: &str,
    ) -> SwarmResult<AckResponse> {
        let request = ReportFailureRequest {
            worker_id: worker_id.to_string(),
            task_id: task_id.to_string(),
            reason: reason.to_string(),
        };
        self.post(
            "/report_failure",
            &request,
            self.timeouts.submit,
            Subject::Task(task_id),
        )
        .await
    }

    async fn post<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        timeout: Duration,
        subject: Subject<'_>,
    ) -> SwarmResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| SwarmError::Network(format!("{path} request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Resp>()
                .await
                .map_err(|e| SwarmError::Serialization(format!("{path} response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!("{} failed: HTTP {} - {}", path, status, message);
        Err(map_status(status, message, subject))
    }
}

/// Pull `error.message` out of the dispatcher's error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn map_status(status: StatusCode, message: String, subject: Subject<'_>) -> SwarmError {
    match status {
        StatusCode::BAD_REQUEST => SwarmError::Validation(message),
        StatusCode::NOT_FOUND => match subject {
            Subject::Worker(id) => SwarmError::WorkerNotFound { id: id.to_string() },
            Subject::Task(id) => SwarmError::TaskNotFound { id: id.to_string() },
        },
        StatusCode::FORBIDDEN => {
            let (task_id, worker_id) = match subject {
                Subject::Task(id) => (id, ""),
                Subject::Worker(id) => ("", id),
            };
            SwarmError::Forbidden {
                task_id: task_id.to_string(),
                worker_id: worker_id.to_string(),
            }
        }
        s if s.is_server_error() => SwarmError::TransientInfra(format!("HTTP {s}: {message}")),
        s => SwarmError::Internal(format!("HTTP {s}: {message}")),
    }
}
