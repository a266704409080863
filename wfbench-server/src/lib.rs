use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info};
use uuid::Uuid;
use wfbench_common::{
    ErrorResponse, RegisterWorkerRequest, RegisterWorkerResponse, StartWorkflowRequest,
    StartWorkflowResponse, TaskCompletion, WorkflowResult, WorkflowTask,
};

pub mod config;
use config::{LOCK_TIMEOUT, POLL_TIMEOUT};

/// A started workflow and the channel its final result is published on.
pub struct WorkflowRecord {
    pub run_id: String,
    /// Token of the workflow's first task while it can still be completed.
    pub task_token: String,
    /// Past this instant an unresolved workflow is reported as timed out.
    pub deadline: Instant,
    pub result: watch::Sender<Option<WorkflowResult>>,
}

impl WorkflowRecord {
    pub fn is_resolved(&self) -> bool {
        self.result.borrow().is_some()
    }
}

/// All keys are scoped by namespace, see [`scoped`].
pub struct ServiceState {
    pub queues: HashMap<String, VecDeque<WorkflowTask>>,
    pub workflows: HashMap<String, WorkflowRecord>,
    /// task token → scoped workflow key
    pub task_tokens: HashMap<String, String>,
    /// scoped task queue → registered worker identities
    pub workers: HashMap<String, Vec<String>>,
}

pub type Db = Arc<RwLock<ServiceState>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    /// Woken whenever a task is pushed onto any queue.
    pub task_ready: Arc<Notify>,
    pub poll_timeout: Duration,
}

impl AppState {
    pub fn new(poll_timeout: Duration) -> Self {
        Self {
            db: Arc::new(RwLock::new(ServiceState {
                queues: HashMap::new(),
                workflows: HashMap::new(),
                task_tokens: HashMap::new(),
                workers: HashMap::new(),
            })),
            task_ready: Arc::new(Notify::new()),
            poll_timeout,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub poll_timeout: Duration,
}

impl ServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, poll_timeout: POLL_TIMEOUT }
    }
}

/// In-memory development service: one FIFO queue per task queue name and a
/// result table. Nothing is persisted.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState::new(config.poll_timeout);
        Self { config, state }
    }

    /// Handle on the server's state; clones share it with the running server.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/namespaces/:ns/workers", post(handle_register_worker))
            .route("/namespaces/:ns/workflows", post(handle_start_workflow))
            .route("/namespaces/:ns/workflows/:id/result", get(handle_get_result))
            .route("/namespaces/:ns/task-queues/:queue/poll", get(handle_poll_task))
            .route("/namespaces/:ns/tasks/:token/complete", post(handle_complete_task))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(self, ready_tx: tokio::sync::oneshot::Sender<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::create_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "development service listening");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Namespace-qualified key for queues and workflows.
pub fn scoped(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

fn lock_timeout_response() -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "Server error: Lock acquisition timed out")
}

/// Handler for GET /health
pub async fn handle_health() -> StatusCode {
    StatusCode::OK
}

/// Handler for POST /namespaces/:ns/workers: records a worker for a task queue.
pub async fn handle_register_worker(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Response {
    if req.task_queue.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "task_queue must not be empty");
    }

    let mut db_guard = match timeout(LOCK_TIMEOUT, state.db.write()).await {
        Ok(guard) => guard,
        Err(_) => return lock_timeout_response(),
    };

    let identity = format!("worker-{}", Uuid::new_v4());
    db_guard
        .workers
        .entry(scoped(&ns, &req.task_queue))
        .or_default()
        .push(identity.clone());
    debug!(namespace = %ns, task_queue = %req.task_queue, %identity, "worker registered");

    Json(RegisterWorkerResponse { identity }).into_response()
}

/// Handler for POST /namespaces/:ns/workflows: starts a workflow.
///
/// With `request_eager_execution`, and a worker registered on the task queue,
/// the first task is returned in the response and never enters the queue.
/// Otherwise it is queued for the next poller.
pub async fn handle_start_workflow(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    Json(req): Json<StartWorkflowRequest>,
) -> Response {
    if req.workflow_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "workflow_id must not be empty");
    }
    if req.task_queue.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "task_queue must not be empty");
    }

    let Some(deadline) = Instant::now().checked_add(Duration::from_secs(req.execution_timeout_secs))
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("execution_timeout_secs out of range: {}", req.execution_timeout_secs),
        );
    };

    let mut db_guard = match timeout(LOCK_TIMEOUT, state.db.write()).await {
        Ok(guard) => guard,
        Err(_) => return lock_timeout_response(),
    };

    let key = scoped(&ns, &req.workflow_id);
    if db_guard.workflows.contains_key(&key) {
        return error_response(
            StatusCode::CONFLICT,
            format!("Workflow execution already started: {}", req.workflow_id),
        );
    }

    let run_id = Uuid::new_v4().to_string();
    let task = WorkflowTask {
        task_token: Uuid::new_v4().to_string(),
        workflow_id: req.workflow_id.clone(),
        workflow_type: req.workflow_type,
        input: req.input,
    };
    let (result, _) = watch::channel(None);
    let queue_key = scoped(&ns, &req.task_queue);

    db_guard.task_tokens.insert(task.task_token.clone(), key.clone());
    db_guard.workflows.insert(
        key,
        WorkflowRecord {
            run_id: run_id.clone(),
            task_token: task.task_token.clone(),
            deadline,
            result,
        },
    );

    let has_worker = db_guard.workers.get(&queue_key).is_some_and(|w| !w.is_empty());
    let eager_task = if req.request_eager_execution && has_worker {
        Some(task)
    } else {
        db_guard.queues.entry(queue_key).or_default().push_back(task);
        None
    };
    drop(db_guard);

    debug!(
        namespace = %ns,
        workflow_id = %req.workflow_id,
        eager = eager_task.is_some(),
        "workflow started"
    );
    if eager_task.is_none() {
        state.task_ready.notify_waiters();
    }

    Json(StartWorkflowResponse { run_id, eager_task }).into_response()
}

/// Handler for GET /namespaces/:ns/task-queues/:queue/poll: long-polls for the
/// next task, answering 204 once the poll timeout passes with nothing queued.
pub async fn handle_poll_task(
    State(state): State<AppState>,
    Path((ns, queue)): Path<(String, String)>,
) -> Response {
    let queue_key = scoped(&ns, &queue);
    let deadline = Instant::now() + state.poll_timeout;

    loop {
        // Register interest before inspecting the queue so a push between the
        // check and the wait is not missed.
        let notified = state.task_ready.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        {
            let mut db_guard = match timeout(LOCK_TIMEOUT, state.db.write()).await {
                Ok(guard) => guard,
                Err(_) => return lock_timeout_response(),
            };
            if let Some(task) = pop_live_task(&mut db_guard, &queue_key, &ns) {
                return Json(task).into_response();
            }
        }

        if timeout_at(deadline, notified).await.is_err() {
            return StatusCode::NO_CONTENT.into_response();
        }
    }
}

/// Pop the oldest task whose workflow is still unresolved, discarding tasks
/// of workflows that already timed out.
fn pop_live_task(db: &mut ServiceState, queue_key: &str, ns: &str) -> Option<WorkflowTask> {
    loop {
        let task = db.queues.get_mut(queue_key)?.pop_front()?;
        let live = db
            .workflows
            .get(&scoped(ns, &task.workflow_id))
            .is_some_and(|r| !r.is_resolved());
        if live {
            return Some(task);
        }
    }
}

/// Handler for POST /namespaces/:ns/tasks/:token/complete: records a worker's outcome.
/// A token stops being valid once its workflow is resolved, by completion or timeout.
pub async fn handle_complete_task(
    State(state): State<AppState>,
    Path((_ns, token)): Path<(String, String)>,
    Json(completion): Json<TaskCompletion>,
) -> Response {
    let mut db_guard = match timeout(LOCK_TIMEOUT, state.db.write()).await {
        Ok(guard) => guard,
        Err(_) => return lock_timeout_response(),
    };

    let Some(key) = db_guard.task_tokens.remove(&token) else {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown task token: {token}"));
    };
    let Some(record) = db_guard.workflows.get(&key) else {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown workflow: {key}"));
    };
    record.result.send_replace(Some(completion.into()));
    debug!(workflow = %key, run_id = %record.run_id, "workflow resolved");
    StatusCode::OK.into_response()
}

/// Handler for GET /namespaces/:ns/workflows/:id/result: waits until the
/// workflow resolves or its deadline passes, whichever comes first.
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path((ns, id)): Path<(String, String)>,
) -> Response {
    let key = scoped(&ns, &id);

    let (mut rx, deadline) = {
        let db_guard = match timeout(LOCK_TIMEOUT, state.db.read()).await {
            Ok(guard) => guard,
            Err(_) => return lock_timeout_response(),
        };
        match db_guard.workflows.get(&key) {
            Some(record) => (record.result.subscribe(), record.deadline),
            None => return error_response(StatusCode::NOT_FOUND, format!("Unknown workflow: {id}")),
        }
    };

    let waited = timeout_at(deadline, async {
        rx.wait_for(Option::is_some).await.map(|r| r.clone())
    })
    .await;

    match waited {
        Ok(Ok(Some(result))) => Json(result).into_response(),
        Ok(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Result channel closed"),
        Err(_) => {
            let mut db_guard = match timeout(LOCK_TIMEOUT, state.db.write()).await {
                Ok(guard) => guard,
                Err(_) => return lock_timeout_response(),
            };
            let db = &mut *db_guard;
            let Some(record) = db.workflows.get(&key) else {
                return error_response(StatusCode::NOT_FOUND, format!("Unknown workflow: {id}"));
            };
            // A completion may have landed between the deadline and the lock.
            if !record.is_resolved() {
                record.result.send_replace(Some(WorkflowResult::TimedOut));
                db.task_tokens.remove(&record.task_token);
                debug!(workflow = %key, "workflow timed out");
            }
            let result = record.result.borrow().clone().unwrap_or(WorkflowResult::TimedOut);
            Json(result).into_response()
        }
    }
}
