use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use swarm_core::{
    models::{ComponentType, RecordSummary, WorkerCapabilities},
    protocol::{SubmitResultsRequest, WorkItem},
    traits::InferenceBackend,
    SwarmError, SwarmResult,
};
use swarm_worker::{ClientTimeouts, DispatcherClient, WorkerLifecycle, WorkerProfile};

#[derive(Default)]
struct FakeDispatcher {
    registrations: Mutex<u32>,
    /// Heartbeats from any other worker id get a 404.
    known_worker: Mutex<Option<String>>,
    queue: Mutex<VecDeque<WorkItem>>,
    submissions: Mutex<Vec<SubmitResultsRequest>>,
    failures: Mutex<Vec<Value>>,
}

type Shared = Arc<FakeDispatcher>;

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    *state.registrations.lock().unwrap() += 1;
    let id = body["worker_id"].as_str().unwrap_or_default().to_string();
    *state.known_worker.lock().unwrap() = Some(id.clone());
    Json(json!({"status": "registered", "worker_id": id, "assigned_components": ["deck_archetypes"]}))
}

async fn heartbeat(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let known = state.known_worker.lock().unwrap().clone();
    if known.as_deref() == body["worker_id"].as_str() {
        (StatusCode::OK, Json(json!({"status": "success"})))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"message": "worker not found", "type": "not_found", "code": 404}})),
        )
    }
}

async fn get_work(State(state): State<Shared>) -> Json<Value> {
    let tasks: Vec<WorkItem> = state.queue.lock().unwrap().pop_front().into_iter().collect();
    Json(json!({ "tasks": tasks }))
}

async fn submit(State(state): State<Shared>, Json(body): Json<SubmitResultsRequest>) -> Json<Value> {
    state.submissions.lock().unwrap().push(body);
    Json(json!({"status": "success", "message": "merged"}))
}

async fn report_failure(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.failures.lock().unwrap().push(body);
    Json(json!({"status": "success", "message": "recorded"}))
}

async fn serve(state: Shared) -> String {
    let app = Router::new()
        .route("/register", post(register))
        .route("/heartbeat", post(heartbeat))
        .route("/get_work", post(get_work))
        .route("/submit_results", post(submit))
        .route("/report_failure", post(report_failure))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

struct EchoBackend {
    fail: bool,
}

#[async_trait]
impl InferenceBackend for EchoBackend {
    async fn generate(&self, prompt: &str) -> SwarmResult<String> {
        if self.fail {
            return Err(SwarmError::Inference("model offline".into()));
        }
        Ok(format!("Generated analysis of {} characters", prompt.len()))
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

fn work_item(task_id: &str) -> WorkItem {
    WorkItem {
        task_id: task_id.into(),
        record_id: "r-1".into(),
        record_name: "Sol Ring".into(),
        components: vec![ComponentType::DeckArchetypes, ComponentType::BudgetAlternatives],
        record_data: RecordSummary {
            name: "Sol Ring".into(),
            ..Default::default()
        },
    }
}

fn profile(worker_id: &str) -> WorkerProfile {
    WorkerProfile {
        worker_id: worker_id.into(),
        capabilities: WorkerCapabilities::new(false, 16, 8),
        tier: swarm_core::models::CapabilityTier::Balanced,
        max_tasks: 1,
        idle_backoff: Duration::from_millis(20),
        error_backoff: Duration::from_millis(20),
    }
}

fn client(base_url: &str) -> Arc<DispatcherClient> {
    Arc::new(DispatcherClient::new(base_url, ClientTimeouts::default()))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_worker_processes_task_and_stops_on_shutdown() {
    let state = Shared::default();
    state.queue.lock().unwrap().push_back(work_item("t-1"));
    let base_url = serve(state.clone()).await;

    let lifecycle = Arc::new(WorkerLifecycle::new(
        profile("balanced-test"),
        Duration::from_millis(50),
        client(&base_url),
        Arc::new(EchoBackend { fail: false }),
    ));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.run(shutdown_rx).await })
    };

    wait_until(|| !state.submissions.lock().unwrap().is_empty()).await;
    shutdown_tx.send(()).unwrap();
    let summary = runner.await.unwrap().unwrap();

    assert_eq!(summary.tasks_completed, 1);
    let submissions = state.submissions.lock().unwrap();
    let submitted = &submissions[0];
    assert_eq!(submitted.worker_id, "balanced-test");
    assert_eq!(submitted.task_id, "t-1");
    assert_eq!(submitted.results.components.len(), 2);
    assert_eq!(submitted.results.model_info["model"], "echo");
}

#[tokio::test]
async fn test_all_failed_task_is_reported() {
    let state = Shared::default();
    state.queue.lock().unwrap().push_back(work_item("t-9"));
    let base_url = serve(state.clone()).await;

    let lifecycle = Arc::new(WorkerLifecycle::new(
        profile("balanced-broken"),
        Duration::from_secs(30),
        client(&base_url),
        Arc::new(EchoBackend { fail: true }),
    ));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.run(shutdown_rx).await })
    };

    wait_until(|| !state.failures.lock().unwrap().is_empty()).await;
    shutdown_tx.send(()).unwrap();
    let summary = runner.await.unwrap().unwrap();

    assert_eq!(summary.tasks_failed, 1);
    assert!(state.submissions.lock().unwrap().is_empty());
    let failures = state.failures.lock().unwrap();
    assert_eq!(failures[0]["task_id"], "t-9");
    assert!(failures[0]["reason"].as_str().unwrap().contains("model offline"));
}

#[tokio::test]
async fn test_worker_reregisters_after_dispatcher_forgets_it() {
    let state = Shared::default();
    let base_url = serve(state.clone()).await;

    let lifecycle = Arc::new(WorkerLifecycle::new(
        profile("balanced-amnesia"),
        Duration::from_millis(20),
        client(&base_url),
        Arc::new(EchoBackend { fail: false }),
    ));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.run(shutdown_rx).await })
    };

    wait_until(|| *state.registrations.lock().unwrap() == 1).await;
    // Dispatcher reset forgets the worker.
    *state.known_worker.lock().unwrap() = None;

    wait_until(|| *state.registrations.lock().unwrap() >= 2).await;
    shutdown_tx.send(()).unwrap();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_maps_unknown_worker_heartbeat() {
    let state = Shared::default();
    let base_url = serve(state).await;

    let err = client(&base_url)
        .heartbeat("nobody", "idle", 0)
        .await
        .unwrap_err();

    assert!(matches!(err, SwarmError::WorkerNotFound { .. }));
}

#[tokio::test]
async fn test_registration_retries_until_shutdown_when_dispatcher_is_down() {
    // Nothing listens on this port.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let lifecycle = WorkerLifecycle::new(
        profile("balanced-offline"),
        Duration::from_secs(30),
        client(&base_url),
        Arc::new(EchoBackend { fail: false }),
    );
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
    });
    let summary = lifecycle.run(shutdown_rx).await.unwrap();
    stopper.await.unwrap();

    assert_eq!(summary.tasks_completed, 0);
}
