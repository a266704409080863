use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::error;
use wfbench_client::WorkflowHandler;
use wfbench_common::{Clock, SystemClock, WorkflowInput, WorkflowOutput, LOCAL_ACTIVITY_TIMEOUT};

/// The benchmark workflow: reports how long after the trial start it began running.
///
/// The clock read runs as a local step on the blocking pool, bounded by
/// `step_timeout` (`LOCAL_ACTIVITY_TIMEOUT` unless overridden).
#[derive(Debug, Clone)]
pub struct TimeToInteract<C = SystemClock> {
    clock: Arc<C>,
    step_timeout: Duration,
}

impl<C: Clock> TimeToInteract<C> {
    pub fn new(clock: C) -> Self {
        Self { clock: Arc::new(clock), step_timeout: LOCAL_ACTIVITY_TIMEOUT }
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }
}

impl<C: Clock + 'static> WorkflowHandler for TimeToInteract<C> {
    async fn execute(&self, input: WorkflowInput) -> Result<WorkflowOutput, String> {
        let clock = Arc::clone(&self.clock);
        let start = input.start_unix_micros;
        let step = spawn_blocking(move || elapsed_since(clock.as_ref(), start));

        match timeout(self.step_timeout, step).await {
            Ok(Ok(time_to_interact_micros)) => Ok(WorkflowOutput { time_to_interact_micros }),
            Ok(Err(e)) => {
                error!(start_unix_micros = start, error = %e, "local activity failed");
                Err(format!("local activity failed: {e}"))
            }
            Err(_) => {
                error!(start_unix_micros = start, "local activity timed out");
                Err(format!("local activity timed out after {:?}", self.step_timeout))
            }
        }
    }
}

/// Microseconds between `start_unix_micros` and now. Not clamped: a clock
/// behind the submitter's yields a negative value.
pub fn elapsed_since(clock: &impl Clock, start_unix_micros: i64) -> i64 {
    clock.unix_now_micros() - start_unix_micros
}
