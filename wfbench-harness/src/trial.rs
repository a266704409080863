use std::time::{Instant, SystemTime};
use tracing::debug;
use uuid::Uuid;
use wfbench_common::Result;

use crate::orchestrator::Orchestrator;

/// One completed submit-and-await cycle.
#[derive(Debug, Clone)]
pub struct Trial {
    pub workflow_id: String,
    pub started_at: Instant,
    /// Reported by the remote handler; may be negative under clock skew.
    pub time_to_interact_micros: i64,
    /// Measured locally from `started_at` until the result arrived.
    pub time_to_complete_micros: i64,
}

/// Workflow id for a new trial: `eager_wf_<uuid v4>`.
pub fn new_workflow_id() -> String {
    format!("eager_wf_{}", Uuid::new_v4())
}

/// Runs single trials against an orchestrator, one at a time.
pub struct TrialRunner<'a, O> {
    orchestrator: &'a O,
    task_queue: &'a str,
    eager: bool,
}

impl<'a, O: Orchestrator> TrialRunner<'a, O> {
    pub fn new(orchestrator: &'a O, task_queue: &'a str, eager: bool) -> Self {
        Self { orchestrator, task_queue, eager }
    }

    /// Start a trial now and block until the workflow has finished.
    pub async fn run(&self) -> Result<Trial> {
        self.run_from(Instant::now(), SystemTime::now()).await
    }

    /// Run a trial whose start was captured by the caller. `started_at` times
    /// completion locally; `start_wall` is the payload the remote handler
    /// measures time-to-interact against.
    pub async fn run_from(&self, started_at: Instant, start_wall: SystemTime) -> Result<Trial> {
        let workflow_id = new_workflow_id();

        let handle = self
            .orchestrator
            .submit_task(self.task_queue, &workflow_id, start_wall, self.eager)
            .await?;
        let time_to_interact_micros = self.orchestrator.await_result(handle).await?;
        let time_to_complete_micros = started_at.elapsed().as_micros() as i64;

        debug!(%workflow_id, time_to_interact_micros, time_to_complete_micros, "trial finished");
        Ok(Trial { workflow_id, started_at, time_to_interact_micros, time_to_complete_micros })
    }
}
