use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::de::DeserializeOwned;
use std::time::Duration;
use wfbench_common::{
    RegisterWorkerRequest, RegisterWorkerResponse, StartWorkflowRequest, StartWorkflowResponse,
    TaskCompletion, WorkflowInput, WorkflowOutput, WorkflowResult, WorkflowTask,
};
use wfbench_server::{
    handle_complete_task, handle_get_result, handle_health, handle_poll_task,
    handle_register_worker, handle_start_workflow, scoped, AppState, Server, ServerConfig,
};

// --- Test helpers ---

const NS: &str = "default";
const QUEUE: &str = "q";

fn state() -> AppState {
    AppState::new(Duration::from_millis(50))
}

fn start_request(id: &str, eager: bool, timeout_secs: u64) -> StartWorkflowRequest {
    StartWorkflowRequest {
        workflow_id: id.to_string(),
        workflow_type: "eager-bench".to_string(),
        task_queue: QUEUE.to_string(),
        input: WorkflowInput { start_unix_micros: 1_000 },
        execution_timeout_secs: timeout_secs,
        request_eager_execution: eager,
    }
}

/// Consume a JSON response body.
async fn response_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(state: &AppState) {
    let response = handle_register_worker(
        State(state.clone()),
        Path(NS.to_string()),
        Json(RegisterWorkerRequest { task_queue: QUEUE.to_string() }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Start a workflow and return the decoded response.
async fn start(state: &AppState, id: &str, eager: bool) -> StartWorkflowResponse {
    let response = handle_start_workflow(
        State(state.clone()),
        Path(NS.to_string()),
        Json(start_request(id, eager, 10)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

async fn poll(state: &AppState) -> Response {
    handle_poll_task(State(state.clone()), Path((NS.to_string(), QUEUE.to_string()))).await
}

async fn complete(state: &AppState, token: &str, micros: i64) -> Response {
    handle_complete_task(
        State(state.clone()),
        Path((NS.to_string(), token.to_string())),
        Json(TaskCompletion::Completed {
            output: WorkflowOutput { time_to_interact_micros: micros },
        }),
    )
    .await
}

async fn result(state: &AppState, id: &str) -> Response {
    handle_get_result(State(state.clone()), Path((NS.to_string(), id.to_string()))).await
}

// --- Server struct ---

#[test]
fn test_server_creation_with_config() {
    use std::net::SocketAddr;
    let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
    let server = Server::new(ServerConfig::new(addr));
    assert_eq!(server.address().to_string(), "0.0.0.0:9000");
}

#[test]
fn test_router_creation() {
    let router = Server::create_router(state());
    assert!(std::mem::size_of_val(&router) > 0);
}

#[test]
fn test_scoped_key() {
    assert_eq!(scoped("ns", "wf"), "ns/wf");
}

#[tokio::test]
async fn test_health() {
    assert_eq!(handle_health().await, StatusCode::OK);
}

// --- Worker registration ---

#[tokio::test]
async fn test_register_worker_assigns_identity() {
    let state = state();
    let response = handle_register_worker(
        State(state.clone()),
        Path(NS.to_string()),
        Json(RegisterWorkerRequest { task_queue: QUEUE.to_string() }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: RegisterWorkerResponse = response_json(response).await;
    assert!(body.identity.starts_with("worker-"));
    assert_eq!(state.db.read().await.workers[&scoped(NS, QUEUE)], vec![body.identity]);
}

#[tokio::test]
async fn test_register_worker_rejects_empty_queue() {
    let response = handle_register_worker(
        State(state()),
        Path(NS.to_string()),
        Json(RegisterWorkerRequest { task_queue: String::new() }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Start ---

#[tokio::test]
async fn test_start_queues_task_when_not_eager() {
    let state = state();
    let started = start(&state, "wf-1", false).await;
    assert!(started.eager_task.is_none());

    let db = state.db.read().await;
    let queued = &db.queues[&scoped(NS, QUEUE)];
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].workflow_id, "wf-1");
    assert_eq!(db.workflows[&scoped(NS, "wf-1")].run_id, started.run_id);
}

#[tokio::test]
async fn test_start_returns_task_inline_when_eager() {
    let state = state();
    register(&state).await;
    let started = start(&state, "wf-1", true).await;
    let task = started.eager_task.expect("eager start must return the task");
    assert_eq!(task.workflow_id, "wf-1");
    assert_eq!(task.input, WorkflowInput { start_unix_micros: 1_000 });

    assert!(state.db.read().await.queues.get(&scoped(NS, QUEUE)).is_none());
    assert_eq!(poll(&state).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_eager_start_without_registered_worker_is_queued() {
    let state = state();
    let started = start(&state, "wf-1", true).await;
    assert!(started.eager_task.is_none());

    let task: WorkflowTask = response_json(poll(&state).await).await;
    assert_eq!(task.workflow_id, "wf-1");
}

#[tokio::test]
async fn test_eager_start_needs_worker_on_same_queue() {
    let state = state();
    register(&state).await;
    let mut req = start_request("wf-1", true, 10);
    req.task_queue = "other".to_string();

    let response = handle_start_workflow(State(state.clone()), Path(NS.to_string()), Json(req)).await;
    let started: StartWorkflowResponse = response_json(response).await;
    assert!(started.eager_task.is_none());
    assert_eq!(state.db.read().await.queues[&scoped(NS, "other")].len(), 1);
}

#[tokio::test]
async fn test_start_rejects_out_of_range_timeout() {
    let state = state();
    let response = handle_start_workflow(
        State(state.clone()),
        Path(NS.to_string()),
        Json(start_request("wf-1", false, u64::MAX)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.db.read().await.workflows.is_empty());
}

#[tokio::test]
async fn test_start_rejects_duplicate_workflow_id() {
    let state = state();
    start(&state, "wf-1", false).await;
    let response = handle_start_workflow(
        State(state.clone()),
        Path(NS.to_string()),
        Json(start_request("wf-1", false, 10)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_same_workflow_id_in_other_namespace_is_allowed() {
    let state = state();
    start(&state, "wf-1", false).await;
    let response = handle_start_workflow(
        State(state.clone()),
        Path("other".to_string()),
        Json(start_request("wf-1", false, 10)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_start_rejects_empty_ids() {
    let state = state();
    let response = handle_start_workflow(
        State(state.clone()),
        Path(NS.to_string()),
        Json(start_request("", false, 10)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut req = start_request("wf-1", false, 10);
    req.task_queue.clear();
    let response = handle_start_workflow(State(state), Path(NS.to_string()), Json(req)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Poll ---

#[tokio::test]
async fn test_poll_returns_204_when_queue_empty() {
    assert_eq!(poll(&state()).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_poll_returns_tasks_in_fifo_order() {
    let state = state();
    start(&state, "wf-1", false).await;
    start(&state, "wf-2", false).await;

    let first: WorkflowTask = response_json(poll(&state).await).await;
    let second: WorkflowTask = response_json(poll(&state).await).await;
    assert_eq!(first.workflow_id, "wf-1");
    assert_eq!(second.workflow_id, "wf-2");
}

#[tokio::test]
async fn test_poll_wakes_when_task_arrives() {
    let state = AppState::new(Duration::from_secs(5));
    let poller = tokio::spawn({
        let state = state.clone();
        async move { poll(&state).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    start(&state, "wf-1", false).await;

    let response = poller.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let task: WorkflowTask = response_json(response).await;
    assert_eq!(task.workflow_id, "wf-1");
}

// --- Complete + result ---

#[tokio::test]
async fn test_complete_then_result() {
    let state = state();
    register(&state).await;
    let task = start(&state, "wf-1", true).await.eager_task.unwrap();

    assert_eq!(complete(&state, &task.task_token, 250).await.status(), StatusCode::OK);

    let response = result(&state, "wf-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: WorkflowResult = response_json(response).await;
    assert_eq!(
        body,
        WorkflowResult::Completed { output: WorkflowOutput { time_to_interact_micros: 250 } }
    );
}

#[tokio::test]
async fn test_result_waits_for_completion() {
    let state = state();
    register(&state).await;
    let task = start(&state, "wf-1", true).await.eager_task.unwrap();

    let waiter = tokio::spawn({
        let state = state.clone();
        async move { result(&state, "wf-1").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    complete(&state, &task.task_token, 7).await;

    let body: WorkflowResult = response_json(waiter.await.unwrap()).await;
    assert!(matches!(body, WorkflowResult::Completed { .. }));
}

#[tokio::test]
async fn test_complete_twice_is_rejected() {
    let state = state();
    register(&state).await;
    let task = start(&state, "wf-1", true).await.eager_task.unwrap();
    complete(&state, &task.task_token, 1).await;
    // The token is consumed by the first completion.
    assert_eq!(complete(&state, &task.task_token, 1).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_unknown_token() {
    assert_eq!(complete(&state(), "nope", 1).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_result_unknown_workflow() {
    assert_eq!(result(&state(), "nope").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unresolved_workflow_times_out() {
    let state = state();
    register(&state).await;
    let response = handle_start_workflow(
        State(state.clone()),
        Path(NS.to_string()),
        Json(start_request("wf-1", true, 0)),
    )
    .await;
    let started: StartWorkflowResponse = response_json(response).await;
    let task = started.eager_task.unwrap();

    let body: WorkflowResult = response_json(result(&state, "wf-1").await).await;
    assert_eq!(body, WorkflowResult::TimedOut);
    assert!(state.db.read().await.task_tokens.is_empty());

    // The token went with the timeout, so a late completion changes nothing.
    assert_eq!(complete(&state, &task.task_token, 1).await.status(), StatusCode::NOT_FOUND);
    let body: WorkflowResult = response_json(result(&state, "wf-1").await).await;
    assert_eq!(body, WorkflowResult::TimedOut);
}

#[tokio::test]
async fn test_poll_skips_tasks_of_timed_out_workflows() {
    let state = state();
    handle_start_workflow(
        State(state.clone()),
        Path(NS.to_string()),
        Json(start_request("wf-stale", false, 0)),
    )
    .await;
    result(&state, "wf-stale").await;
    start(&state, "wf-live", false).await;

    let task: WorkflowTask = response_json(poll(&state).await).await;
    assert_eq!(task.workflow_id, "wf-live");

    let db = state.db.read().await;
    assert_eq!(db.task_tokens.len(), 1);
    assert!(db.task_tokens.contains_key(&task.task_token));
}
