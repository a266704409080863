use crate::trial::Trial;

/// Time-to-interact and time-to-complete of every measured trial, in trial
/// order, as microseconds. Both sequences always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    time_to_interact: Vec<i64>,
    time_to_complete: Vec<i64>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one trial's pair of durations.
    pub fn record(&mut self, trial: &Trial) {
        self.time_to_interact.push(trial.time_to_interact_micros);
        self.time_to_complete.push(trial.time_to_complete_micros);
    }

    pub fn len(&self) -> usize {
        self.time_to_interact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_to_interact.is_empty()
    }

    pub fn time_to_interact(&self) -> &[i64] {
        &self.time_to_interact
    }

    pub fn time_to_complete(&self) -> &[i64] {
        &self.time_to_complete
    }

    pub fn time_to_interact_f64(&self) -> Vec<f64> {
        as_f64(&self.time_to_interact)
    }

    pub fn time_to_complete_f64(&self) -> Vec<f64> {
        as_f64(&self.time_to_complete)
    }
}

fn as_f64(micros: &[i64]) -> Vec<f64> {
    micros.iter().map(|&m| m as f64).collect()
}
