//! Final comparison of one benchmark run, rendered as a table or JSON.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{compare, serialize_seconds, speedup, ComparisonRow};
use crate::config::ChunkSize;
use crate::stats::{RunResult, WriteFailure};

/// Everything the driver reports after both strategies completed.
///
/// Per-destination durations cover the flush calls only. The two totals are
/// the wall-clock time of each whole run, partitioning and dispatch
/// included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub run_id: Uuid,
    pub record_count: usize,
    pub chunk_size: ChunkSize,
    pub concurrent: bool,
    pub rows: Vec<ComparisonRow>,
    #[serde(rename = "naive_total_seconds", serialize_with = "serialize_seconds")]
    pub naive_total: Duration,
    #[serde(rename = "batched_total_seconds", serialize_with = "serialize_seconds")]
    pub batched_total: Duration,
    pub naive_failures: Vec<WriteFailure>,
    pub batched_failures: Vec<WriteFailure>,
}

impl ComparisonReport {
    pub fn new(
        run_id: Uuid,
        record_count: usize,
        chunk_size: ChunkSize,
        concurrent: bool,
        naive: &RunResult,
        batched: &RunResult,
    ) -> Self {
        Self {
            run_id,
            record_count,
            chunk_size,
            concurrent,
            rows: compare(naive, batched),
            naive_total: naive.elapsed(),
            batched_total: batched.elapsed(),
            naive_failures: naive.failures().to_vec(),
            batched_failures: batched.failures().to_vec(),
        }
    }

    /// Ratio of the two wall-clock totals.
    pub fn speedup(&self) -> Option<f64> {
        speedup(self.naive_total, self.batched_total)
    }

    pub fn row(&self, destination: writebench_types::Destination) -> Option<&ComparisonRow> {
        self.rows.iter().find(|row| row.destination == destination)
    }
}

fn format_speedup(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "-".to_string(), |ratio| format!("{ratio:.2}x"))
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<11}  {:>9}  {:>14}  {:>11}  {:>16}  {:>8}  {:>7}",
            "Destination",
            "Naive Ops",
            "Naive Time (s)",
            "Batched Ops",
            "Batched Time (s)",
            "Failures",
            "Speedup"
        )?;
        writeln!(f, "{}", "-".repeat(88))?;

        for row in &self.rows {
            writeln!(
                f,
                "{:<11}  {:>9}  {:>14.3}  {:>11}  {:>16.3}  {:>8}  {:>7}",
                row.destination.as_str(),
                row.naive_operations,
                row.naive_duration.as_secs_f64(),
                row.batched_operations,
                row.batched_duration.as_secs_f64(),
                format!("{}/{}", row.naive_failures, row.batched_failures),
                format_speedup(row.speedup())
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Total time for naive approach: {:.3} seconds",
            self.naive_total.as_secs_f64()
        )?;
        writeln!(
            f,
            "Total time for batched approach: {:.3} seconds",
            self.batched_total.as_secs_f64()
        )?;
        write!(f, "Overall speedup: {}", format_speedup(self.speedup()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{ChunkIndex, StatKey, WriteStat};
    use writebench_types::Destination;

    fn stat(destination: Destination, operations: usize, millis: u64) -> WriteStat {
        WriteStat {
            destination,
            operations,
            duration: Duration::from_millis(millis),
        }
    }

    fn sample_report() -> ComparisonReport {
        let mut naive = RunResult::new();
        naive.record(
            StatKey::whole(Destination::Flights),
            stat(Destination::Flights, 9, 60),
        );
        naive.record(
            StatKey::whole(Destination::Positions),
            stat(Destination::Positions, 5, 30),
        );
        naive.record(
            StatKey::whole(Destination::Surfaces),
            stat(Destination::Surfaces, 4, 30),
        );
        naive.set_elapsed(Duration::from_millis(150));

        let mut batched = RunResult::new();
        for (chunk, flights, positions) in [(0, 4, 2), (1, 4, 2), (2, 1, 1)] {
            let chunk = ChunkIndex::new(chunk);
            batched.record(
                StatKey::chunked(Destination::Flights, chunk),
                stat(Destination::Flights, flights, 10),
            );
            batched.record(
                StatKey::chunked(Destination::Positions, chunk),
                stat(Destination::Positions, positions, 5),
            );
        }
        batched.record(
            StatKey::chunked(Destination::Surfaces, ChunkIndex::new(0)),
            stat(Destination::Surfaces, 2, 10),
        );
        batched.record_failure(WriteFailure {
            key: StatKey::chunked(Destination::Surfaces, ChunkIndex::new(1)),
            operations: 2,
            reason: "insert_batch operation on surfaces failed".to_string(),
        });
        batched.set_elapsed(Duration::from_millis(75));

        ComparisonReport::new(
            Uuid::nil(),
            9,
            ChunkSize::try_new(4).unwrap(),
            true,
            &naive,
            &batched,
        )
    }

    #[test]
    fn renders_fixed_width_table_with_totals() {
        let report = sample_report();

        insta::assert_snapshot!(report.to_string(), @r"
        Destination  Naive Ops  Naive Time (s)  Batched Ops  Batched Time (s)  Failures  Speedup
        ----------------------------------------------------------------------------------------
        flights              9           0.060            9             0.030       0/0    2.00x
        positions            5           0.030            5             0.015       0/0    2.00x
        surfaces             4           0.030            2             0.010       0/1    3.00x

        Total time for naive approach: 0.150 seconds
        Total time for batched approach: 0.075 seconds
        Overall speedup: 2.00x
        ");
    }

    #[test]
    fn json_output_carries_seconds_and_failures() {
        let report = sample_report();

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["record_count"], 9);
        assert_eq!(json["chunk_size"], 4);
        assert_eq!(json["rows"][0]["destination"], "flights");
        assert_eq!(json["naive_total_seconds"], 0.15);
        assert_eq!(json["batched_failures"][0]["key"]["destination"], "surfaces");
        assert_eq!(json["batched_failures"][0]["key"]["chunk"], 1);
    }

    #[test]
    fn zero_batched_time_has_no_speedup() {
        let report = ComparisonReport::new(
            Uuid::nil(),
            0,
            ChunkSize::default(),
            true,
            &RunResult::new(),
            &RunResult::new(),
        );

        assert_eq!(report.speedup(), None);
        assert!(report.to_string().ends_with("Overall speedup: -"));
    }
}
