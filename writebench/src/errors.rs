//! Error types for writebench runs.
//!
//! # Error Categories
//!
//! - **Configuration**: invalid chunk size or record count, raised before any I/O
//! - **Translation**: a record or document cannot be routed to a destination
//! - **Store**: a flush call failed or reported rejected operations
//! - **Reset**: a destination could not be cleared between runs
//! - **TaskJoin**: a concurrently dispatched write task did not complete
//!
//! Whether a `Store` or `TaskJoin` error ends the run depends on the
//! [`FailurePolicy`](crate::config::FailurePolicy) of the strategy that hit
//! it. The other categories always end the run.

use crate::config::ConfigurationError;
use thiserror::Error;
use writebench_types::{Destination, StoreError, TranslationError};

/// Errors that can end a benchmark run.
#[derive(Debug, Clone, Error)]
pub enum BenchError {
    /// Configuration values were rejected.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A record could not be translated for routing.
    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    /// A flush call to a destination failed.
    #[error("write to {destination} failed: {source}")]
    Store {
        /// Destination the flush was addressed to
        destination: Destination,
        /// Error reported by the store
        #[source]
        source: StoreError,
    },

    /// Clearing a destination before a run failed.
    #[error("failed to reset {destination}: {source}")]
    Reset {
        /// Destination that could not be cleared
        destination: Destination,
        /// Error reported by the store
        #[source]
        source: StoreError,
    },

    /// A dispatched write task panicked or was cancelled before reporting.
    #[error("write task for {destination} did not complete: {detail}")]
    TaskJoin {
        /// Destination the task was writing to
        destination: Destination,
        /// Description of the join failure
        detail: String,
    },
}

impl BenchError {
    /// Whether the error came from writing to a destination, as opposed to
    /// configuration, translation or reset failures.
    pub const fn is_write_failure(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::TaskJoin { .. })
    }
}

/// Convenience alias for results of benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;
