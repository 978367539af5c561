//! Deterministic failure injection and call recording.
//!
//! `FaultScriptStore` fails exactly the calls it was told to fail, addressed
//! by destination and by the ordinal of the call to that destination, and
//! records every write call it sees. Because the batched writer issues at
//! most one call per destination per chunk, the ordinal of a destination's
//! call equals the chunk index whenever that destination received a
//! non-empty bucket in every earlier chunk.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use writebench_types::{
    BulkWriteAck, Destination, Document, DocumentStore, Operation, StoreError, UpsertOne, WriteMode,
};

/// A write call observed by [`FaultScriptStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Destination the call was addressed to.
    pub destination: Destination,
    /// Upsert or insert.
    pub mode: WriteMode,
    /// Number of operations in the submitted batch.
    pub operations: usize,
    /// Whether the call was failed by the script.
    pub failed: bool,
}

#[derive(Debug, Default)]
struct FaultState {
    scripted: HashMap<Destination, HashSet<usize>>,
    ordinals: HashMap<Destination, usize>,
    calls: Vec<RecordedCall>,
}

/// Document store wrapper that fails scripted calls and records every write.
#[derive(Clone)]
pub struct FaultScriptStore<S> {
    store: S,
    state: Arc<Mutex<FaultState>>,
}

impl<S> FaultScriptStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(FaultState::default())),
        }
    }

    /// Fail the `ordinal`-th (zero based) write call addressed to `destination`.
    #[must_use]
    pub fn fail_call(self, destination: Destination, ordinal: usize) -> Self {
        let _ = self
            .lock()
            .scripted
            .entry(destination)
            .or_default()
            .insert(ordinal);
        self
    }

    /// Every write call seen so far, in the order they were issued.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Write calls addressed to one destination.
    pub fn calls_to(&self, destination: Destination) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.destination == destination)
            .cloned()
            .collect()
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FaultState> {
        self.state
            .lock()
            .expect("fault script mutex should not be poisoned")
    }

    fn record(&self, destination: Destination, mode: WriteMode, operations: usize) -> bool {
        let mut state = self.lock();
        let ordinal = state.ordinals.entry(destination).or_insert(0);
        let current = *ordinal;
        *ordinal += 1;

        let failed = state
            .scripted
            .get(&destination)
            .is_some_and(|ordinals| ordinals.contains(&current));

        state.calls.push(RecordedCall {
            destination,
            mode,
            operations,
            failed,
        });
        failed
    }
}

impl<S> DocumentStore for FaultScriptStore<S>
where
    S: DocumentStore + Sync,
{
    fn upsert_batch(
        &self,
        destination: Destination,
        operations: Vec<UpsertOne>,
    ) -> impl Future<Output = Result<BulkWriteAck, StoreError>> + Send {
        let should_fail = self.record(destination, WriteMode::Upsert, operations.len());
        let store = &self.store;

        async move {
            if should_fail {
                return Err(StoreError::StoreFailure {
                    operation: Operation::UpsertBatch,
                    destination,
                });
            }

            store.upsert_batch(destination, operations).await
        }
    }

    fn insert_batch(
        &self,
        destination: Destination,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<BulkWriteAck, StoreError>> + Send {
        let should_fail = self.record(destination, WriteMode::Insert, documents.len());
        let store = &self.store;

        async move {
            if should_fail {
                return Err(StoreError::StoreFailure {
                    operation: Operation::InsertBatch,
                    destination,
                });
            }

            store.insert_batch(destination, documents).await
        }
    }

    fn clear(
        &self,
        destination: Destination,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.store.clear(destination)
    }

    fn count(
        &self,
        destination: Destination,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send {
        self.store.count(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use writebench_memory::InMemoryDocumentStore;

    #[tokio::test]
    async fn scripted_ordinal_fails_only_that_call() {
        // Given: a script failing the second insert into positions
        let store =
            FaultScriptStore::new(InMemoryDocumentStore::new()).fail_call(Destination::Positions, 1);

        // When: three inserts are issued to positions
        let first = store
            .insert_batch(Destination::Positions, vec![json!({})])
            .await;
        let second = store
            .insert_batch(Destination::Positions, vec![json!({})])
            .await;
        let third = store
            .insert_batch(Destination::Positions, vec![json!({})])
            .await;

        // Then: only the second one failed and nothing it carried was stored
        assert!(first.is_ok() && third.is_ok());
        assert_eq!(
            second,
            Err(StoreError::StoreFailure {
                operation: Operation::InsertBatch,
                destination: Destination::Positions,
            })
        );
        assert_eq!(store.count(Destination::Positions).await, Ok(2));
    }

    #[tokio::test]
    async fn ordinals_are_tracked_per_destination() {
        let store =
            FaultScriptStore::new(InMemoryDocumentStore::new()).fail_call(Destination::Surfaces, 0);

        let positions = store
            .insert_batch(Destination::Positions, vec![json!({})])
            .await;
        let surfaces = store
            .insert_batch(Destination::Surfaces, vec![json!({})])
            .await;

        assert!(positions.is_ok());
        assert!(surfaces.is_err());
        assert_eq!(
            store.calls(),
            vec![
                RecordedCall {
                    destination: Destination::Positions,
                    mode: WriteMode::Insert,
                    operations: 1,
                    failed: false,
                },
                RecordedCall {
                    destination: Destination::Surfaces,
                    mode: WriteMode::Insert,
                    operations: 1,
                    failed: true,
                },
            ]
        );
    }
}
