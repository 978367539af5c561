//! Folding of two strategy runs into per-destination comparison rows.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Serialize, Serializer};
use writebench_types::Destination;

use crate::stats::RunResult;

pub(crate) fn serialize_seconds<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// One destination's totals under both strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
    pub destination: Destination,
    pub naive_operations: usize,
    #[serde(rename = "naive_seconds", serialize_with = "serialize_seconds")]
    pub naive_duration: Duration,
    pub naive_failures: usize,
    pub batched_operations: usize,
    #[serde(rename = "batched_seconds", serialize_with = "serialize_seconds")]
    pub batched_duration: Duration,
    pub batched_failures: usize,
}

impl ComparisonRow {
    /// Naive flush time divided by batched flush time, or `None` when the
    /// batched side spent no measurable time.
    pub fn speedup(&self) -> Option<f64> {
        speedup(self.naive_duration, self.batched_duration)
    }
}

pub(crate) fn speedup(naive: Duration, batched: Duration) -> Option<f64> {
    if batched.is_zero() {
        None
    } else {
        Some(naive.as_secs_f64() / batched.as_secs_f64())
    }
}

/// Build one row per destination that appears in either run, as a stat or a
/// failure. Batched totals are summed over every chunk of the destination;
/// the side a destination is missing from contributes zeros.
pub fn compare(naive: &RunResult, batched: &RunResult) -> Vec<ComparisonRow> {
    let destinations: BTreeSet<Destination> = naive
        .destinations()
        .union(&batched.destinations())
        .copied()
        .collect();

    destinations
        .into_iter()
        .map(|destination| {
            let (naive_operations, naive_duration) = naive.totals_for(destination);
            let (batched_operations, batched_duration) = batched.totals_for(destination);
            ComparisonRow {
                destination,
                naive_operations,
                naive_duration,
                naive_failures: naive.failures_for(destination),
                batched_operations,
                batched_duration,
                batched_failures: batched.failures_for(destination),
            }
        })
        .collect()
}
