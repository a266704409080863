use tracing::{debug, info};
use wfbench_common::Result;

use crate::config::BenchConfig;
use crate::orchestrator::{Connector, Orchestrator};
use crate::samples::SampleSet;
use crate::stats::{self, PercentileSummary};
use crate::trial::TrialRunner;

/// Where a [`BenchmarkLoop`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    WarmingUp,
    Measuring,
    Reporting,
    Done,
}

/// Outcome of a completed run. The samples are frozen here.
#[derive(Debug, Clone)]
pub struct BenchReport {
    time_to_interact: PercentileSummary,
    time_to_complete: PercentileSummary,
    samples: SampleSet,
}

impl BenchReport {
    pub fn time_to_interact(&self) -> &PercentileSummary {
        &self.time_to_interact
    }

    pub fn time_to_complete(&self) -> &PercentileSummary {
        &self.time_to_complete
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }
}

/// Connect, warm up, measure, report. Every failure aborts the run.
pub struct BenchmarkLoop {
    config: BenchConfig,
    phase: Phase,
}

impl BenchmarkLoop {
    pub fn new(config: BenchConfig) -> Self {
        Self { config, phase: Phase::Connecting }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the benchmark to completion. The connection obtained from
    /// `connector` is closed before returning, whether the run succeeded or not.
    pub async fn run<C: Connector>(&mut self, connector: &C) -> Result<BenchReport> {
        info!(
            eager = self.config.eager,
            iterations = self.config.iterations,
            local = self.config.local,
            "starting benchmark"
        );

        self.enter(Phase::Connecting);
        let mut connection = match connector.connect(&self.config).await {
            Ok(c) => c,
            Err(e) => {
                self.enter(Phase::Done);
                return Err(e);
            }
        };

        let outcome = self.drive(&mut connection).await;
        connection.close().await;
        self.enter(Phase::Done);
        outcome
    }

    async fn drive<O: Orchestrator>(&mut self, connection: &mut O) -> Result<BenchReport> {
        let task_queue = self.config.task_queue.clone();
        connection.register_handler(&task_queue).await?;

        let runner = TrialRunner::new(&*connection, &task_queue, self.config.eager);

        self.enter(Phase::WarmingUp);
        for _ in 0..self.config.warmup_trials {
            runner.run().await?;
        }

        self.enter(Phase::Measuring);
        info!("Time_to_interact (microseconds), Time_to_complete (microseconds)");
        let mut samples = SampleSet::new();
        for _ in 0..self.config.iterations {
            let trial = runner.run().await?;
            info!("{} {}", trial.time_to_interact_micros, trial.time_to_complete_micros);
            samples.record(&trial);
        }

        self.enter(Phase::Reporting);
        let time_to_interact = stats::summarize(&samples.time_to_interact_f64())?;
        info!("Time_to_interact (microseconds): {time_to_interact}");
        let time_to_complete = stats::summarize(&samples.time_to_complete_f64())?;
        info!("Time_to_complete (microseconds): {time_to_complete}");

        Ok(BenchReport { time_to_interact, time_to_complete, samples })
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "benchmark phase");
        self.phase = next;
    }
}
