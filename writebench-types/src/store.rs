use crate::record::{Document, FlightId, MessageKind};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A named sink within the document store.
///
/// There are exactly three destinations. `Flights` holds the latest known
/// state per flight identity (upsert semantics); `Positions` and `Surfaces`
/// accumulate append-only inserts of the records whose discriminator matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Latest state per flight, keyed by flight identity.
    Flights,
    /// Append-only log of position reports.
    Positions,
    /// Append-only log of surface reports.
    Surfaces,
}

impl Destination {
    /// Every destination, in flush order.
    pub const ALL: [Self; 3] = [Self::Flights, Self::Positions, Self::Surfaces];

    /// Collection name used by store backends.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flights => "flights",
            Self::Positions => "positions",
            Self::Surfaces => "surfaces",
        }
    }

    /// The append-only destination receiving records of the given kind.
    pub const fn for_kind(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Position => Self::Positions,
            MessageKind::Surface => Self::Surfaces,
        }
    }

    /// Whether the destination is written with upserts or inserts.
    pub const fn write_mode(self) -> WriteMode {
        match self {
            Self::Flights => WriteMode::Upsert,
            Self::Positions | Self::Surfaces => WriteMode::Insert,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a destination accumulates documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Idempotent overwrite keyed by flight identity.
    Upsert,
    /// Append without any identity constraint.
    Insert,
}

/// A single idempotent upsert: replace the document matching `filter`, or
/// insert it when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOne {
    /// Identity the replacement is keyed by.
    pub filter: FlightId,
    /// Full replacement document.
    pub replacement: Document,
}

impl UpsertOne {
    pub fn new(filter: FlightId, replacement: Document) -> Self {
        Self {
            filter,
            replacement,
        }
    }
}

/// Acknowledgement of a bulk write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkWriteAck {
    /// Number of operations the store applied.
    pub applied: usize,
}

/// A single operation rejected inside an unordered bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Position of the rejected operation in the submitted batch.
    pub index: usize,
    pub detail: String,
}

/// Identifies the store operation that failed.
///
/// Used by `StoreError::StoreFailure` to provide strongly-typed
/// identification of which operation encountered an infrastructure failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Unordered bulk upsert.
    UpsertBatch,
    /// Unordered bulk insert.
    InsertBatch,
    /// Removing every document of a destination.
    Clear,
    /// Counting the documents of a destination.
    Count,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpsertBatch => write!(f, "upsert_batch"),
            Self::InsertBatch => write!(f, "insert_batch"),
            Self::Clear => write!(f, "clear"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Error type returned by document store operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The bulk call completed but some operations were rejected.
    ///
    /// Unordered calls keep going past individual failures, so the
    /// remaining operations of the batch may have been applied.
    #[error("{} operation(s) rejected by bulk write to {destination}", .failures.len())]
    BulkWrite {
        destination: Destination,
        failures: Vec<OperationFailure>,
    },

    /// Represents infrastructure failures surfaced by the backing store (e.g., connection drops).
    #[error("{operation} operation on {destination} failed")]
    StoreFailure {
        operation: Operation,
        destination: Destination,
    },
}

impl StoreError {
    /// The destination the failed call was addressed to.
    pub const fn destination(&self) -> Destination {
        match self {
            Self::BulkWrite { destination, .. } | Self::StoreFailure { destination, .. } => {
                *destination
            }
        }
    }
}

/// Trait defining the contract for document store backends.
///
/// A store exposes three destinations, each supporting an unordered
/// idempotent upsert batch, an unordered insert batch, and a clear. Unordered
/// means the store may apply operations in any order and continues past
/// individual failures within the same call.
///
/// Store handles are shared between concurrently running write tasks, so
/// implementations must be safe for concurrent use.
///
/// Implementations include:
/// - `writebench-postgres`: PostgreSQL backend storing JSONB documents
/// - `writebench-memory`: In-memory backend for testing and dry runs
pub trait DocumentStore {
    /// Upsert every document of the batch, keyed by its filter identity.
    ///
    /// Re-applying the same batch leaves the destination unchanged. When the
    /// same identity occurs several times in one batch, the last occurrence
    /// wins.
    fn upsert_batch(
        &self,
        destination: Destination,
        operations: Vec<UpsertOne>,
    ) -> impl Future<Output = Result<BulkWriteAck, StoreError>> + Send;

    /// Append every document of the batch.
    fn insert_batch(
        &self,
        destination: Destination,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<BulkWriteAck, StoreError>> + Send;

    /// Remove every document held by the destination.
    fn clear(
        &self,
        destination: Destination,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Number of documents currently held by the destination.
    fn count(
        &self,
        destination: Destination,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
