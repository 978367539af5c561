//! In-memory adapter for the writebench document store port
//!
//! This crate provides an in-memory implementation of the `DocumentStore`
//! trait, useful for testing and for dry runs of the benchmark where no real
//! database is available.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use writebench_types::{
    BulkWriteAck, Destination, Document, DocumentStore, FlightId, StoreError, UpsertOne,
};

/// Documents held by a single destination.
#[derive(Debug, Default)]
struct Collection {
    // Upserted documents, keyed by identity
    keyed: HashMap<FlightId, Document>,
    // Inserted documents in arrival order
    appended: Vec<Document>,
}

impl Collection {
    fn len(&self) -> usize {
        self.keyed.len() + self.appended.len()
    }
}

/// Thread-safe in-memory document store for testing
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<Destination, Collection>>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty in-memory document store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document held for `flight_id` in an upserted destination.
    pub fn latest(&self, destination: Destination, flight_id: &FlightId) -> Option<Document> {
        self.collections
            .read()
            .get(&destination)
            .and_then(|collection| collection.keyed.get(flight_id).cloned())
    }

    /// Every document appended to the destination, in arrival order.
    pub fn appended(&self, destination: Destination) -> Vec<Document> {
        self.collections
            .read()
            .get(&destination)
            .map(|collection| collection.appended.clone())
            .unwrap_or_default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    async fn upsert_batch(
        &self,
        destination: Destination,
        operations: Vec<UpsertOne>,
    ) -> Result<BulkWriteAck, StoreError> {
        let applied = operations.len();
        let mut collections = self.collections.write();
        let collection = collections.entry(destination).or_default();

        for operation in operations {
            let _ = collection
                .keyed
                .insert(operation.filter, operation.replacement);
        }

        debug!(
            destination = %destination,
            applied,
            "[memory.upsert_batch] applied upserts"
        );
        Ok(BulkWriteAck { applied })
    }

    async fn insert_batch(
        &self,
        destination: Destination,
        documents: Vec<Document>,
    ) -> Result<BulkWriteAck, StoreError> {
        let applied = documents.len();
        self.collections
            .write()
            .entry(destination)
            .or_default()
            .appended
            .extend(documents);

        debug!(
            destination = %destination,
            applied,
            "[memory.insert_batch] appended documents"
        );
        Ok(BulkWriteAck { applied })
    }

    async fn clear(&self, destination: Destination) -> Result<(), StoreError> {
        let _ = self.collections.write().remove(&destination);
        Ok(())
    }

    async fn count(&self, destination: Destination) -> Result<usize, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&destination)
            .map_or(0, Collection::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flight(id: &str) -> FlightId {
        FlightId::try_new(id).expect("valid flight id")
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryDocumentStore::new();
        assert!(store.collections.read().is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_storage() {
        let store1 = InMemoryDocumentStore::new();
        let store2 = store1.clone();

        // Verify both stores point to the same storage
        assert!(Arc::ptr_eq(&store1.collections, &store2.collections));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_identity() {
        let store = InMemoryDocumentStore::new();
        let id = flight("AB12CD");

        let _ = store
            .upsert_batch(
                Destination::Flights,
                vec![
                    UpsertOne::new(id.clone(), json!({ "altitude": 1000 })),
                    UpsertOne::new(id.clone(), json!({ "altitude": 2000 })),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.count(Destination::Flights).await.unwrap(), 1);
        assert_eq!(
            store.latest(Destination::Flights, &id),
            Some(json!({ "altitude": 2000 }))
        );
    }

    #[tokio::test]
    async fn test_insert_appends_in_arrival_order() {
        let store = InMemoryDocumentStore::new();

        let ack = store
            .insert_batch(
                Destination::Positions,
                vec![json!({ "n": 1 }), json!({ "n": 1 }), json!({ "n": 2 })],
            )
            .await
            .unwrap();

        assert_eq!(ack.applied, 3);
        assert_eq!(
            store.appended(Destination::Positions),
            vec![json!({ "n": 1 }), json!({ "n": 1 }), json!({ "n": 2 })]
        );
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_destination() {
        let store = InMemoryDocumentStore::new();
        let _ = store
            .insert_batch(Destination::Positions, vec![json!({})])
            .await
            .unwrap();
        let _ = store
            .insert_batch(Destination::Surfaces, vec![json!({})])
            .await
            .unwrap();

        store.clear(Destination::Positions).await.unwrap();

        assert_eq!(store.count(Destination::Positions).await.unwrap(), 0);
        assert_eq!(store.count(Destination::Surfaces).await.unwrap(), 1);
    }
}
