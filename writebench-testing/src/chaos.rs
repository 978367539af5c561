use std::future::Future;
use std::sync::{Arc, Mutex};

use nutype::nutype;
use rand::{random, rngs::StdRng, Rng, SeedableRng};
use writebench_types::{
    BulkWriteAck, Destination, Document, DocumentStore, Operation, OperationFailure, StoreError,
    UpsertOne,
};

/// Probability value for chaos engineering injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// # Examples
///
/// ```ignore
/// use writebench_testing::chaos::Probability;
///
/// let never = Probability::try_new(0.0).unwrap();
/// let sometimes = Probability::try_new(0.5).unwrap();
/// let always = Probability::try_new(1.0).unwrap();
///
/// // Values outside [0.0, 1.0] are rejected
/// assert!(Probability::try_new(1.5).is_err());
/// assert!(Probability::try_new(-0.1).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

/// Failure rates of a [`ChaosDocumentStore`]. Both rates default to zero.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Probability,
    rejection_probability: Probability,
}

impl ChaosConfig {
    /// Configuration with a fixed seed, so injected failures repeat run to run.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Probability that a call fails outright with a store failure.
    pub fn with_failure_probability(mut self, probability: f32) -> Self {
        self.failure_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }

    /// Probability that a bulk call completes with every operation rejected.
    pub fn with_rejection_probability(mut self, probability: f32) -> Self {
        self.rejection_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            failure_probability: Probability::try_new(0.0).expect("0.0 is valid probability"),
            rejection_probability: Probability::try_new(0.0).expect("0.0 is valid probability"),
        }
    }
}

/// Wraps any store in a [`ChaosDocumentStore`].
pub trait ChaosDocumentStoreExt: Sized {
    /// Inject failures into the write calls of `self`.
    fn with_chaos(self, config: ChaosConfig) -> ChaosDocumentStore<Self>;
}

/// Document store wrapper that randomly fails write calls.
///
/// Clones share the random number generator, so a deterministic seed yields
/// one reproducible failure sequence across every task using the store.
#[derive(Clone)]
pub struct ChaosDocumentStore<S> {
    store: S,
    config: ChaosConfig,
    rng: Arc<Mutex<StdRng>>,
}

impl<S> ChaosDocumentStore<S> {
    pub fn new(store: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            store,
            config,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let prob_f32: f32 = probability.into();

        if prob_f32 <= 0.0 {
            return false;
        }

        if prob_f32 >= 1.0 {
            return true;
        }

        let mut rng = self
            .rng
            .lock()
            .expect("chaos RNG mutex should not be poisoned");

        rng.random_bool(f64::from(prob_f32))
    }

    fn injected_error(
        &self,
        operation: Operation,
        destination: Destination,
        batch_len: usize,
    ) -> Option<StoreError> {
        if self.should_inject(self.config.failure_probability) {
            return Some(StoreError::StoreFailure {
                operation,
                destination,
            });
        }

        if self.should_inject(self.config.rejection_probability) {
            let failures = (0..batch_len)
                .map(|index| OperationFailure {
                    index,
                    detail: "rejected by chaos injection".to_string(),
                })
                .collect();
            return Some(StoreError::BulkWrite {
                destination,
                failures,
            });
        }

        None
    }
}

impl<S> DocumentStore for ChaosDocumentStore<S>
where
    S: DocumentStore + Sync,
{
    fn upsert_batch(
        &self,
        destination: Destination,
        operations: Vec<UpsertOne>,
    ) -> impl Future<Output = Result<BulkWriteAck, StoreError>> + Send {
        let injected = self.injected_error(Operation::UpsertBatch, destination, operations.len());
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
            }

            store.upsert_batch(destination, operations).await
        }
    }

    fn insert_batch(
        &self,
        destination: Destination,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<BulkWriteAck, StoreError>> + Send {
        let injected = self.injected_error(Operation::InsertBatch, destination, documents.len());
        let store = &self.store;

        async move {
            if let Some(error) = injected {
                return Err(error);
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

impl<S> ChaosDocumentStoreExt for S
where
    S: DocumentStore + Sync,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosDocumentStore<Self> {
        ChaosDocumentStore::new(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use writebench_memory::InMemoryDocumentStore;

    #[test]
    fn deterministic_config_sets_seed() {
        let default_is_none = ChaosConfig::default().deterministic_seed.is_none();
        let deterministic_is_some = ChaosConfig::deterministic().deterministic_seed.is_some();

        assert!(default_is_none && deterministic_is_some);
    }

    #[tokio::test]
    async fn zero_probability_passthrough_allows_normal_operations() {
        let chaos_store = InMemoryDocumentStore::new().with_chaos(ChaosConfig::default());

        let insert_result = chaos_store
            .insert_batch(Destination::Positions, vec![json!({ "n": 1 })])
            .await;
        let count = chaos_store.count(Destination::Positions).await;

        assert_eq!(insert_result, Ok(BulkWriteAck { applied: 1 }));
        assert_eq!(count, Ok(1));
    }

    #[tokio::test]
    async fn certain_failure_never_reaches_the_inner_store() {
        let base_store = InMemoryDocumentStore::new();
        let chaos_store = base_store
            .clone()
            .with_chaos(ChaosConfig::deterministic().with_failure_probability(1.0));

        let result = chaos_store
            .insert_batch(Destination::Surfaces, vec![json!({ "n": 1 })])
            .await;

        assert_eq!(
            result,
            Err(StoreError::StoreFailure {
                operation: Operation::InsertBatch,
                destination: Destination::Surfaces,
            })
        );
        assert_eq!(base_store.count(Destination::Surfaces).await, Ok(0));
    }

    #[tokio::test]
    async fn certain_rejection_reports_every_operation() {
        let chaos_store = InMemoryDocumentStore::new()
            .with_chaos(ChaosConfig::deterministic().with_rejection_probability(1.0));

        let result = chaos_store
            .insert_batch(Destination::Positions, vec![json!({}), json!({})])
            .await;

        assert!(matches!(
            result,
            Err(StoreError::BulkWrite { ref failures, .. }) if failures.len() == 2
        ));
    }

    #[test]
    fn deterministic_half_probability_does_not_inject_immediately() {
        let chaos_store = ChaosDocumentStore::new(
            InMemoryDocumentStore::new(),
            ChaosConfig::deterministic().with_failure_probability(0.5),
        );

        assert!(!chaos_store.should_inject(Probability::try_new(0.5).unwrap()));
    }
}
