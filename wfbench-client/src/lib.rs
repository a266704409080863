use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use wfbench_common::{
    Endpoint, ErrorResponse, RegisterWorkerRequest, RegisterWorkerResponse, Result,
    StartWorkflowRequest, StartWorkflowResponse, TaskCompletion, WfBenchError, WorkflowOutput,
    WorkflowResult, WorkflowTask,
};

pub mod tls;
pub mod worker;

pub use worker::{Worker, WorkerHandle, WorkflowHandler};

/// How the client reaches the service.
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Plain HTTP, for a development service on the local machine.
    Local,
    /// HTTPS presenting a client certificate.
    Tls { identity: reqwest::Identity },
}

/// wfbench client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub mode: ConnectionMode,
}

type EagerDispatch = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<WorkflowTask>>>>;

/// Client for the orchestration service. Cheap to clone; clones share the
/// HTTP connection pool and the set of local workers.
#[derive(Clone)]
pub struct Client {
    pub config: ClientConfig,
    base_url: String,
    http_client: reqwest::Client,
    /// task queue → channel into the local worker polling that queue
    eager_dispatch: EagerDispatch,
}

impl Client {
    /// Build a client without touching the network.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let (scheme, builder) = match &config.mode {
            ConnectionMode::Local => ("http", reqwest::Client::builder()),
            ConnectionMode::Tls { identity } => (
                "https",
                reqwest::Client::builder().use_rustls_tls().identity(identity.clone()),
            ),
        };
        let http_client = builder
            .build()
            .map_err(|e| WfBenchError::ConnectionError(e.to_string()))?;
        let base_url = format!("{scheme}://{}", config.endpoint.host);

        Ok(Self {
            config,
            base_url,
            http_client,
            eager_dispatch: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Build a client and confirm the service answers its health check.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.check_health().await?;
        debug!(url = %client.base_url, namespace = %client.config.endpoint.namespace, "connected");
        Ok(client)
    }

    /// Build the URL for a namespaced service path (which must start with `/`).
    pub fn build_url(&self, path: &str) -> String {
        format!("{}/namespaces/{}{}", self.base_url, self.config.endpoint.namespace, path)
    }

    pub async fn check_health(&self) -> Result<()> {
        let response = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| WfBenchError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WfBenchError::ConnectionError(error_message(status, response).await));
        }
        Ok(())
    }

    /// Announce a worker for `task_queue`; returns the identity the service assigned.
    pub async fn register_worker(&self, task_queue: &str) -> Result<String> {
        let response = self
            .http_client
            .post(self.build_url("/workers"))
            .json(&RegisterWorkerRequest { task_queue: task_queue.to_string() })
            .send()
            .await
            .map_err(|e| WfBenchError::RegistrationError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WfBenchError::RegistrationError(error_message(status, response).await));
        }

        let body: RegisterWorkerResponse = response
            .json()
            .await
            .map_err(|e| WfBenchError::RegistrationError(e.to_string()))?;
        Ok(body.identity)
    }

    /// Start a workflow; returns its run id.
    ///
    /// Eager execution is only requested when a worker started from this
    /// client is polling the request's task queue. Otherwise the request is
    /// downgraded to a normal start.
    pub async fn start_workflow(&self, mut request: StartWorkflowRequest) -> Result<String> {
        let eager_tx = if request.request_eager_execution {
            self.eager_worker(&request.task_queue).await
        } else {
            None
        };
        request.request_eager_execution = eager_tx.is_some();

        let response = self
            .http_client
            .post(self.build_url("/workflows"))
            .json(&request)
            .send()
            .await
            .map_err(|e| WfBenchError::SubmissionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WfBenchError::SubmissionError(error_message(status, response).await));
        }

        let body: StartWorkflowResponse = response
            .json()
            .await
            .map_err(|e| WfBenchError::SubmissionError(e.to_string()))?;

        if let Some(task) = body.eager_task {
            let delivered = eager_tx.map(|tx| tx.send(task).is_ok()).unwrap_or(false);
            if !delivered {
                return Err(WfBenchError::SubmissionError(format!(
                    "eager task for {} could not be handed to a local worker",
                    request.workflow_id
                )));
            }
        }

        Ok(body.run_id)
    }

    /// Wait for a workflow to finish and return its output.
    /// A failed or timed-out workflow is an `ExecutionError`.
    pub async fn get_result(&self, workflow_id: &str) -> Result<WorkflowOutput> {
        let response = self
            .http_client
            .get(self.build_url(&format!("/workflows/{workflow_id}/result")))
            .send()
            .await
            .map_err(|e| WfBenchError::ExecutionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WfBenchError::ExecutionError(error_message(status, response).await));
        }

        let result: WorkflowResult = response
            .json()
            .await
            .map_err(|e| WfBenchError::ExecutionError(e.to_string()))?;

        match result {
            WorkflowResult::Completed { output } => Ok(output),
            WorkflowResult::Failed { message } => Err(WfBenchError::ExecutionError(format!(
                "workflow {workflow_id} failed: {message}"
            ))),
            WorkflowResult::TimedOut => Err(WfBenchError::ExecutionError(format!(
                "workflow {workflow_id} timed out"
            ))),
        }
    }

    /// Long-poll `task_queue`; `None` when the service had no work before its poll timeout.
    pub async fn poll_task(&self, task_queue: &str) -> Result<Option<WorkflowTask>> {
        let response = self
            .http_client
            .get(self.build_url(&format!("/task-queues/{task_queue}/poll")))
            .send()
            .await
            .map_err(|e| WfBenchError::ExecutionError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(WfBenchError::ExecutionError(error_message(status, response).await));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| WfBenchError::ExecutionError(e.to_string()))
    }

    /// Report the outcome of a task received from a poll or an eager start.
    pub async fn complete_task(&self, task_token: &str, completion: &TaskCompletion) -> Result<()> {
        let response = self
            .http_client
            .post(self.build_url(&format!("/tasks/{task_token}/complete")))
            .json(completion)
            .send()
            .await
            .map_err(|e| WfBenchError::ExecutionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WfBenchError::ExecutionError(error_message(status, response).await));
        }
        Ok(())
    }

    /// `true` if a live local worker is attached to `task_queue`.
    pub async fn has_local_worker(&self, task_queue: &str) -> bool {
        self.eager_worker(task_queue).await.is_some()
    }

    async fn eager_worker(&self, task_queue: &str) -> Option<mpsc::UnboundedSender<WorkflowTask>> {
        self.eager_dispatch
            .read()
            .await
            .get(task_queue)
            .filter(|tx| !tx.is_closed())
            .cloned()
    }

    pub(crate) async fn attach_worker(&self, task_queue: &str, tx: mpsc::UnboundedSender<WorkflowTask>) {
        self.eager_dispatch.write().await.insert(task_queue.to_string(), tx);
    }

    pub(crate) async fn detach_worker(&self, task_queue: &str) {
        self.eager_dispatch.write().await.remove(task_queue);
    }
}

/// `HTTP <code>: <message>` using the service's error envelope when present.
async fn error_message(status: reqwest::StatusCode, response: reqwest::Response) -> String {
    let error_msg = response
        .json::<ErrorResponse>()
        .await
        .map(|r| r.error)
        .unwrap_or_else(|_| format!("Server returned status: {}", status));

    format!("HTTP {}: {}", status.as_u16(), error_msg)
}
