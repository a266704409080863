use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Task queue the benchmark workflow is registered on.
pub const TASK_QUEUE: &str = "eager-wf-bench";

/// Workflow type name carried by every start request.
pub const WORKFLOW_TYPE: &str = "eager-bench";

/// Upper bound the service gives a started workflow before timing it out.
pub const WORKFLOW_EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the measurement sub-step run inside the workflow handler.
pub const LOCAL_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error types for wfbench operations
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WfBenchError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Registration error: {0}")]
    RegistrationError(String),

    #[error("Submission error: {0}")]
    SubmissionError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Credential error: {0}")]
    CredentialError(String),
}

impl WfBenchError {
    /// `true` for errors raised before the first trial could run.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            WfBenchError::ConnectionError(_)
                | WfBenchError::RegistrationError(_)
                | WfBenchError::CredentialError(_)
        )
    }
}

/// Result type for wfbench operations
pub type Result<T> = std::result::Result<T, WfBenchError>;

/// Where the orchestration service lives and which namespace to address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// `host:port` of the service.
    pub host: String,
    pub namespace: String,
}

/// Abstraction over wall-clock time for testability.
pub trait Clock: Send + Sync {
    fn unix_now_micros(&self) -> i64;
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now_micros(&self) -> i64 {
        unix_micros(SystemTime::now())
    }
}

/// Microseconds since the Unix epoch; negative for times before it.
pub fn unix_micros(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_micros() as i64,
        Err(e) => -(e.duration().as_micros() as i64),
    }
}

/// Payload handed to the benchmark workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    /// Wall-clock instant the trial started, in Unix microseconds.
    pub start_unix_micros: i64,
}

/// Value the benchmark workflow completes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowOutput {
    /// Elapsed time between the trial start and the handler running. May be
    /// negative when the worker's clock lags the submitter's.
    pub time_to_interact_micros: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub input: WorkflowInput,
    pub execution_timeout_secs: u64,
    /// Ask the service to hand the first task back in the start response.
    #[serde(default)]
    pub request_eager_execution: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub run_id: String,
    /// Present only when eager execution was requested and granted.
    #[serde(default)]
    pub eager_task: Option<WorkflowTask>,
}

/// A unit of work dispatched to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub task_token: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub input: WorkflowInput,
}

/// Outcome a worker reports for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskCompletion {
    Completed { output: WorkflowOutput },
    Failed { message: String },
}

/// Final state of a workflow as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowResult {
    Completed { output: WorkflowOutput },
    Failed { message: String },
    TimedOut,
}

impl From<TaskCompletion> for WorkflowResult {
    fn from(c: TaskCompletion) -> Self {
        match c {
            TaskCompletion::Completed { output } => WorkflowResult::Completed { output },
            TaskCompletion::Failed { message } => WorkflowResult::Failed { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub task_queue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWorkerResponse {
    pub identity: String,
}

/// JSON error envelope returned by the service for all error responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
