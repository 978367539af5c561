//! Benchmark configuration with type-safe validation.
//!
//! Configuration values use `nutype` validation so that an invalid chunk
//! size or record count is rejected when the configuration is built, before
//! any store I/O takes place.

use nutype::nutype;
use serde::{Deserialize, Serialize};

/// Number of records generated when no count is supplied.
pub const DEFAULT_RECORD_COUNT: usize = 30_000;

/// Number of records per chunk when no chunk size is supplied.
pub const DEFAULT_CHUNK_SIZE: usize = 5_000;

/// Upper bound on the number of records of one run.
pub const MAX_RECORD_COUNT: usize = 10_000_000;

/// Number of records the batched writer processes per chunk.
///
/// Validated to be at least 1; a zero chunk size is a configuration error.
#[nutype(
    validate(greater_or_equal = 1),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct ChunkSize(usize);

impl Default for ChunkSize {
    fn default() -> Self {
        Self::try_new(DEFAULT_CHUNK_SIZE).expect("default chunk size is valid")
    }
}

/// Total number of records written by each strategy.
#[nutype(
    validate(less_or_equal = 10_000_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct RecordCount(usize);

impl Default for RecordCount {
    fn default() -> Self {
        Self::try_new(DEFAULT_RECORD_COUNT).expect("default record count is valid")
    }
}

/// How a writer reacts to a failed flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the run on the first failed flush.
    FailFast,
    /// Log the failure, record it, and keep writing.
    BestEffort,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Error raised when benchmark configuration values are out of range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The chunk size was zero.
    #[error("chunk size must be greater than zero (was {value})")]
    InvalidChunkSize {
        /// The rejected chunk size.
        value: usize,
    },

    /// The record count exceeded [`MAX_RECORD_COUNT`].
    #[error("record count must be at most {max} (was {value})")]
    InvalidRecordCount {
        /// The rejected record count.
        value: usize,
        /// Largest accepted record count.
        max: usize,
    },
}

/// Configuration consumed by the strategy driver.
///
/// The defaults keep the asymmetric failure handling of the two strategies:
/// the naive writer aborts on the first failure while the batched writer
/// keeps making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Records written by each strategy.
    pub record_count: RecordCount,
    /// Records per chunk of the batched strategy.
    pub chunk_size: ChunkSize,
    /// Dispatch the writes of a chunk concurrently.
    pub concurrent: bool,
    /// Reaction of the naive strategy to a failed flush.
    pub naive_policy: FailurePolicy,
    /// Reaction of the batched strategy to a failed flush.
    pub batched_policy: FailurePolicy,
}

impl BenchConfig {
    /// Build a configuration from raw values, validating both.
    pub fn try_new(record_count: usize, chunk_size: usize) -> Result<Self, ConfigurationError> {
        let record_count =
            RecordCount::try_new(record_count).map_err(|_| ConfigurationError::InvalidRecordCount {
                value: record_count,
                max: MAX_RECORD_COUNT,
            })?;
        let chunk_size = ChunkSize::try_new(chunk_size)
            .map_err(|_| ConfigurationError::InvalidChunkSize { value: chunk_size })?;

        Ok(Self {
            record_count,
            chunk_size,
            ..Self::default()
        })
    }

    /// Dispatch the writes of a chunk concurrently or one after another.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Failure policy of the naive strategy.
    #[must_use]
    pub const fn with_naive_policy(mut self, policy: FailurePolicy) -> Self {
        self.naive_policy = policy;
        self
    }

    /// Failure policy of the batched strategy.
    #[must_use]
    pub const fn with_batched_policy(mut self, policy: FailurePolicy) -> Self {
        self.batched_policy = policy;
        self
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            record_count: RecordCount::default(),
            chunk_size: ChunkSize::default(),
            concurrent: true,
            naive_policy: FailurePolicy::FailFast,
            batched_policy: FailurePolicy::BestEffort,
        }
    }
}
