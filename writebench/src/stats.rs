//! Per-flush measurements and the result of one strategy run.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use nutype::nutype;
use serde::Serialize;
use writebench_types::Destination;

/// Zero-based position of a chunk within the record set.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize
))]
pub struct ChunkIndex(usize);

/// Composite key of a measurement.
///
/// The naive strategy keys its stats by destination alone; the batched
/// strategy additionally scopes them to a chunk. Aggregation matches on the
/// `destination` field, never on a rendered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StatKey {
    /// Destination of the flush.
    pub destination: Destination,
    /// Chunk of the flush; `None` for a naive run.
    pub chunk: Option<ChunkIndex>,
}

impl StatKey {
    /// Key of a whole-destination flush.
    pub const fn whole(destination: Destination) -> Self {
        Self {
            destination,
            chunk: None,
        }
    }

    /// Key of a flush scoped to one chunk.
    pub const fn chunked(destination: Destination, chunk: ChunkIndex) -> Self {
        Self {
            destination,
            chunk: Some(chunk),
        }
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chunk {
            Some(chunk) => write!(f, "{}[chunk {chunk}]", self.destination),
            None => write!(f, "{}", self.destination),
        }
    }
}

/// A single measured write: how many operations one flush call carried and
/// how long the call took.
///
/// The duration covers the store call only; partitioning and dispatch are
/// excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStat {
    /// Destination the flush was addressed to.
    pub destination: Destination,
    /// Operations carried by the flush.
    pub operations: usize,
    /// Time spent in the store call.
    pub duration: Duration,
}

/// A flush that failed without ending the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    /// Destination and chunk of the failed flush.
    pub key: StatKey,
    /// Operations carried by the failed call.
    pub operations: usize,
    /// Rendered error of the failed call.
    pub reason: String,
}

/// Everything one strategy run measured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    stats: BTreeMap<StatKey, WriteStat>,
    failures: Vec<WriteFailure>,
    elapsed: Duration,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the stat of a successful flush.
    ///
    /// Keys are disjoint by construction: one flush per destination (naive)
    /// or per destination and chunk (batched).
    pub fn record(&mut self, key: StatKey, stat: WriteStat) {
        debug_assert!(
            !self.stats.contains_key(&key),
            "stat for {key} recorded twice"
        );
        let _ = self.stats.insert(key, stat);
    }

    pub fn record_failure(&mut self, failure: WriteFailure) {
        self.failures.push(failure);
    }

    pub fn stat(&self, key: &StatKey) -> Option<&WriteStat> {
        self.stats.get(key)
    }

    pub fn stats(&self) -> impl Iterator<Item = (&StatKey, &WriteStat)> + '_ {
        self.stats.iter()
    }

    pub fn failures(&self) -> &[WriteFailure] {
        &self.failures
    }

    /// Wall-clock time of the whole run, partitioning and dispatch included.
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Total operations and duration for `destination`, summed over chunks.
    /// A destination with no stat sums to zero.
    pub fn totals_for(&self, destination: Destination) -> (usize, Duration) {
        self.stats
            .iter()
            .filter(|(key, _)| key.destination == destination)
            .fold((0, Duration::ZERO), |(operations, duration), (_, stat)| {
                (operations + stat.operations, duration + stat.duration)
            })
    }

    /// Number of failed flushes addressed to `destination`.
    pub fn failures_for(&self, destination: Destination) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.key.destination == destination)
            .count()
    }

    /// Destinations mentioned by any stat or failure.
    pub fn destinations(&self) -> BTreeSet<Destination> {
        self.stats
            .keys()
            .map(|key| key.destination)
            .chain(self.failures.iter().map(|failure| failure.key.destination))
            .collect()
    }

    /// Number of distinct chunks with at least one recorded stat.
    pub fn chunk_count(&self) -> usize {
        self.stats
            .keys()
            .filter_map(|key| key.chunk)
            .collect::<BTreeSet<_>>()
            .len()
    }
}
