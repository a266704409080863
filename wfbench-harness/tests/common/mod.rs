#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use wfbench_common::{Result, WfBenchError};
use wfbench_harness::config::BenchConfig;
use wfbench_harness::orchestrator::{Connector, Orchestrator};

/// What a mock connection saw, shared with the test after the run.
#[derive(Default)]
pub struct Recorder {
    pub registered: Mutex<Vec<String>>,
    /// (workflow id, eager flag) per submission, in order.
    pub submitted: Mutex<Vec<(String, bool)>>,
    pub closed: AtomicBool,
}

impl Recorder {
    pub fn submissions(&self) -> Vec<(String, bool)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Scripted orchestrator: every trial reports `interact_micros`, optionally
/// failing at a given stage.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub recorder: Arc<Recorder>,
    pub fail_connect: bool,
    pub fail_register: bool,
    /// 0-based submission index that fails with `SubmissionError`.
    pub fail_submit_at: Option<usize>,
    /// 0-based submission index whose result fails with `ExecutionError`.
    pub fail_result_at: Option<usize>,
    pub interact_micros: i64,
}

pub struct MockConnection {
    script: MockConnector,
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, _config: &BenchConfig) -> Result<MockConnection> {
        if self.fail_connect {
            return Err(WfBenchError::ConnectionError("connection refused".to_string()));
        }
        Ok(MockConnection { script: self.clone() })
    }
}

impl Orchestrator for MockConnection {
    type TaskHandle = usize;

    async fn register_handler(&mut self, task_queue: &str) -> Result<()> {
        if self.script.fail_register {
            return Err(WfBenchError::RegistrationError("refused".to_string()));
        }
        self.script.recorder.registered.lock().unwrap().push(task_queue.to_string());
        Ok(())
    }

    async fn submit_task(
        &self,
        _task_queue: &str,
        workflow_id: &str,
        _start: SystemTime,
        eager: bool,
    ) -> Result<usize> {
        let mut submitted = self.script.recorder.submitted.lock().unwrap();
        let index = submitted.len();
        if self.script.fail_submit_at == Some(index) {
            return Err(WfBenchError::SubmissionError(format!("submission {index} rejected")));
        }
        submitted.push((workflow_id.to_string(), eager));
        Ok(index)
    }

    async fn await_result(&self, index: usize) -> Result<i64> {
        if self.script.fail_result_at == Some(index) {
            return Err(WfBenchError::ExecutionError(format!("workflow {index} timed out")));
        }
        Ok(self.script.interact_micros)
    }

    async fn close(self) {
        self.script.recorder.closed.store(true, Ordering::SeqCst);
    }
}

/// Local-mode config with a small warm-up, for fast runs.
pub fn config(iterations: usize, warmup_trials: usize) -> BenchConfig {
    let mut config = BenchConfig::new(false, true, iterations);
    config.warmup_trials = warmup_trials;
    config
}
