use std::future::Future;
use std::time::SystemTime;
use tracing::{debug, info};
use wfbench_client::tls::load_identity;
use wfbench_client::{Client, ClientConfig, ConnectionMode, Worker, WorkerHandle};
use wfbench_common::{
    unix_micros, Result, StartWorkflowRequest, SystemClock, WfBenchError, WorkflowInput,
    WORKFLOW_EXECUTION_TIMEOUT, WORKFLOW_TYPE,
};

use crate::config::BenchConfig;
use crate::workflow::TimeToInteract;

/// The narrow slice of the orchestration service the benchmark drives.
pub trait Orchestrator {
    type TaskHandle;

    /// Register the benchmark workflow handler on `task_queue`.
    fn register_handler(&mut self, task_queue: &str) -> impl Future<Output = Result<()>>;

    /// Start one workflow carrying `start` as its payload.
    fn submit_task(
        &self,
        task_queue: &str,
        workflow_id: &str,
        start: SystemTime,
        eager: bool,
    ) -> impl Future<Output = Result<Self::TaskHandle>>;

    /// Block until the workflow finishes; returns its time-to-interact in microseconds.
    fn await_result(&self, handle: Self::TaskHandle) -> impl Future<Output = Result<i64>>;

    /// Stop any worker and release the connection.
    fn close(self) -> impl Future<Output = ()>;
}

/// Opens an [`Orchestrator`] connection for a run.
pub trait Connector {
    type Connection: Orchestrator;

    fn connect(&self, config: &BenchConfig) -> impl Future<Output = Result<Self::Connection>>;
}

/// Connects over HTTP: plain in local mode, TLS with the configured client
/// certificate otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Connection = HttpOrchestrator;

    async fn connect(&self, config: &BenchConfig) -> Result<HttpOrchestrator> {
        let mode = if config.local {
            ConnectionMode::Local
        } else {
            let identity = load_identity(&config.credentials.cert, &config.credentials.key)?;
            ConnectionMode::Tls { identity }
        };

        let client = Client::connect(ClientConfig { endpoint: config.endpoint.clone(), mode }).await?;
        info!(
            host = %config.endpoint.host,
            namespace = %config.endpoint.namespace,
            "connected to orchestration service"
        );
        Ok(HttpOrchestrator { client, worker: None })
    }
}

/// Identifies a started workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowHandle {
    pub workflow_id: String,
    pub run_id: String,
}

pub struct HttpOrchestrator {
    client: Client,
    worker: Option<WorkerHandle>,
}

impl Orchestrator for HttpOrchestrator {
    type TaskHandle = WorkflowHandle;

    async fn register_handler(&mut self, task_queue: &str) -> Result<()> {
        if self.worker.is_some() {
            return Err(WfBenchError::RegistrationError(
                "a worker is already registered on this connection".to_string(),
            ));
        }
        let handler = TimeToInteract::new(SystemClock);
        let worker = Worker::new(self.client.clone(), task_queue, handler).start().await?;
        info!(identity = %worker.identity, %task_queue, "worker registered");
        self.worker = Some(worker);
        Ok(())
    }

    async fn submit_task(
        &self,
        task_queue: &str,
        workflow_id: &str,
        start: SystemTime,
        eager: bool,
    ) -> Result<WorkflowHandle> {
        let request = StartWorkflowRequest {
            workflow_id: workflow_id.to_string(),
            workflow_type: WORKFLOW_TYPE.to_string(),
            task_queue: task_queue.to_string(),
            input: WorkflowInput { start_unix_micros: unix_micros(start) },
            execution_timeout_secs: WORKFLOW_EXECUTION_TIMEOUT.as_secs(),
            request_eager_execution: eager,
        };
        let run_id = self.client.start_workflow(request).await?;
        Ok(WorkflowHandle { workflow_id: workflow_id.to_string(), run_id })
    }

    async fn await_result(&self, handle: WorkflowHandle) -> Result<i64> {
        debug!(workflow_id = %handle.workflow_id, run_id = %handle.run_id, "awaiting result");
        let output = self.client.get_result(&handle.workflow_id).await?;
        Ok(output.time_to_interact_micros)
    }

    async fn close(self) {
        if let Some(worker) = self.worker {
            worker.stop().await;
        }
    }
}
