use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use wfbench_common::{Result, TaskCompletion, WorkflowInput, WorkflowOutput, WorkflowTask};

use crate::Client;

/// Pause after a failed poll before polling again.
const POLL_BACKOFF: Duration = Duration::from_millis(200);

/// Workflow code run by a [`Worker`] for each task it receives.
pub trait WorkflowHandler: Send + Sync + 'static {
    fn execute(
        &self,
        input: WorkflowInput,
    ) -> impl Future<Output = std::result::Result<WorkflowOutput, String>> + Send;
}

/// Runs a handler for every task dispatched on one task queue.
pub struct Worker<H> {
    client: Client,
    task_queue: String,
    handler: H,
}

impl<H: WorkflowHandler> Worker<H> {
    pub fn new(client: Client, task_queue: impl Into<String>, handler: H) -> Self {
        Self { client, task_queue: task_queue.into(), handler }
    }

    /// Register with the service and spawn the poll and eager-dispatch loops.
    /// Fails with `RegistrationError` if the service refuses the worker.
    pub async fn start(self) -> Result<WorkerHandle> {
        let identity = self.client.register_worker(&self.task_queue).await?;

        let (eager_tx, eager_rx) = mpsc::unbounded_channel();
        self.client.attach_worker(&self.task_queue, eager_tx).await;

        let handler = Arc::new(self.handler);
        let poller = tokio::spawn(poll_loop(
            self.client.clone(),
            self.task_queue.clone(),
            Arc::clone(&handler),
        ));
        let eager = tokio::spawn(eager_loop(self.client.clone(), eager_rx, handler));

        debug!(%identity, task_queue = %self.task_queue, "worker started");
        Ok(WorkerHandle {
            identity,
            client: self.client,
            task_queue: self.task_queue,
            tasks: vec![poller, eager],
        })
    }
}

/// A running worker. Dropping the handle aborts its loops.
pub struct WorkerHandle {
    pub identity: String,
    client: Client,
    task_queue: String,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Detach from the client's eager dispatch and abort the worker's loops.
    pub async fn stop(self) {
        self.client.detach_worker(&self.task_queue).await;
        debug!(identity = %self.identity, "worker stopped");
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn poll_loop<H: WorkflowHandler>(client: Client, task_queue: String, handler: Arc<H>) {
    loop {
        match client.poll_task(&task_queue).await {
            Ok(Some(task)) => run_task(&client, handler.as_ref(), task).await,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, %task_queue, "task poll failed");
                tokio::time::sleep(POLL_BACKOFF).await;
            }
        }
    }
}

async fn eager_loop<H: WorkflowHandler>(
    client: Client,
    mut eager_rx: mpsc::UnboundedReceiver<WorkflowTask>,
    handler: Arc<H>,
) {
    while let Some(task) = eager_rx.recv().await {
        run_task(&client, handler.as_ref(), task).await;
    }
}

async fn run_task<H: WorkflowHandler>(client: &Client, handler: &H, task: WorkflowTask) {
    let completion = match handler.execute(task.input).await {
        Ok(output) => TaskCompletion::Completed { output },
        Err(message) => {
            error!(workflow_id = %task.workflow_id, %message, "workflow failed");
            TaskCompletion::Failed { message }
        }
    };

    if let Err(e) = client.complete_task(&task.task_token, &completion).await {
        warn!(workflow_id = %task.workflow_id, error = %e, "could not report task completion");
    }
}
