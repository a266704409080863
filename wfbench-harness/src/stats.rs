//! Percentile summaries over latency samples.
//!
//! Percentile `k` of `n` sorted samples uses linear interpolation between
//! order statistics: `rank = (k / 100) * (n - 1)` (0-indexed),
//! `lo = floor(rank)`, `hi = min(lo + 1, n - 1)` and the result is
//! `sorted[lo] + (rank - lo) * (sorted[hi] - sorted[lo])`.

use std::fmt;
use wfbench_common::{Result, WfBenchError};

/// p50/p90/p95/p99 of one sample sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileSummary {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl fmt::Display for PercentileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p50={} p90={} p95={} p99={}", self.p50, self.p90, self.p95, self.p99)
    }
}

/// Median, p90, p95 and p99 of `samples`. Fails with `InvalidInput` when empty.
pub fn summarize(samples: &[f64]) -> Result<PercentileSummary> {
    let sorted = sorted_copy(samples)?;
    Ok(PercentileSummary {
        p50: median_of_sorted(&sorted),
        p90: percentile_of_sorted(&sorted, 90.0),
        p95: percentile_of_sorted(&sorted, 95.0),
        p99: percentile_of_sorted(&sorted, 99.0),
    })
}

/// Middle element, or the mean of the two middle elements for an even count.
pub fn median(samples: &[f64]) -> Result<f64> {
    sorted_copy(samples).map(|sorted| median_of_sorted(&sorted))
}

/// Percentile `k` (0..=100) of `samples`.
pub fn percentile(samples: &[f64], k: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&k) {
        return Err(WfBenchError::InvalidInput(format!("percentile {k} is outside 0..=100")));
    }
    sorted_copy(samples).map(|sorted| percentile_of_sorted(&sorted, k))
}

fn sorted_copy(samples: &[f64]) -> Result<Vec<f64>> {
    if samples.is_empty() {
        return Err(WfBenchError::InvalidInput(
            "percentiles are undefined for an empty sample set".to_string(),
        ));
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn percentile_of_sorted(sorted: &[f64], k: f64) -> f64 {
    let n = sorted.len();
    let rank = k / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let fraction = rank - lo as f64;

    sorted[lo] + fraction * (sorted[hi] - sorted[lo])
}
