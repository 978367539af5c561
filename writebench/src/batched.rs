//! Chunked strategy with a bounded fan-out of write tasks per chunk.
//!
//! The whole record set is chunked and translated before the first flush,
//! then chunks are processed strictly in index order. Inside a chunk the
//! records are partitioned into the same three buckets as the naive writer
//! and every non-empty bucket is flushed, either as concurrently running
//! tasks or one after another. A concurrent chunk always waits for all of its tasks before
//! the next chunk starts, so at most three write tasks run at any time.
//!
//! Tasks never share the statistics map. Each one hands its outcome back
//! through the join set and the writer merges outcomes after the barrier.

use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use writebench_types::{Destination, DocumentStore, Record};

use crate::bucket::{plan_chunks, ChunkPlan, PendingWrite};
use crate::config::{ChunkSize, FailurePolicy};
use crate::errors::BenchError;
use crate::flush::flush;
use crate::stats::{ChunkIndex, RunResult, StatKey, WriteFailure, WriteStat};

/// Result of one flush of one chunk, as handed back to the writer.
#[derive(Debug)]
struct FlushOutcome {
    destination: Destination,
    operations: usize,
    result: Result<WriteStat, BenchError>,
}

/// Writes the record set chunk by chunk.
///
/// Under [`FailurePolicy::BestEffort`] (the default) a failed flush is
/// logged and recorded, contributes no stat, and neither the other writes of
/// its chunk nor later chunks are affected. Under [`FailurePolicy::FailFast`]
/// the run ends once the chunk that saw the failure has been joined.
#[derive(Debug, Clone)]
pub struct BatchedWriter<S> {
    store: S,
    chunk_size: ChunkSize,
    concurrent: bool,
    policy: FailurePolicy,
}

impl<S> BatchedWriter<S>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
{
    /// Writer over `store` with concurrent dispatch and best-effort failures.
    pub const fn new(store: S, chunk_size: ChunkSize) -> Self {
        Self {
            store,
            chunk_size,
            concurrent: true,
            policy: FailurePolicy::BestEffort,
        }
    }

    /// Dispatch the writes of a chunk concurrently (`true`, the default) or
    /// sequentially.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Reaction to a failed flush; [`FailurePolicy::BestEffort`] by default.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    pub const fn is_concurrent(&self) -> bool {
        self.concurrent
    }

    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    #[instrument(
        name = "batched.write",
        skip(self, records),
        fields(
            records = records.len(),
            chunk_size = %self.chunk_size,
            concurrent = self.concurrent,
            policy = %self.policy
        )
    )]
    pub async fn write(&self, records: &[Record]) -> Result<RunResult, BenchError> {
        let plan = plan_chunks(records, self.chunk_size)?;
        let mut result = RunResult::new();

        for ChunkPlan {
            chunk,
            records: chunk_records,
            writes,
        } in plan
        {
            debug!(
                chunk = %chunk,
                records = chunk_records,
                writes = writes.len(),
                "[batched.chunk] dispatching chunk"
            );

            let outcomes = if self.concurrent {
                self.dispatch_concurrent(chunk, writes).await
            } else {
                self.dispatch_sequential(chunk, writes).await
            };

            self.merge(chunk, outcomes, &mut result)?;
        }

        Ok(result)
    }

    /// Spawn one task per pending write and wait for every one of them.
    async fn dispatch_concurrent(
        &self,
        chunk: ChunkIndex,
        writes: Vec<PendingWrite>,
    ) -> Vec<FlushOutcome> {
        let dispatched: Vec<(Destination, usize)> = writes
            .iter()
            .map(|write| (write.destination, write.payload.len()))
            .collect();

        let mut tasks = JoinSet::new();
        for write in writes {
            let store = self.store.clone();
            let destination = write.destination;
            let operations = write.payload.len();
            let span = info_span!("batched.task", chunk = %chunk, destination = %destination);

            let _handle = tasks.spawn(
                async move {
                    let result = flush(&store, write)
                        .await
                        .map_err(|source| BenchError::Store {
                            destination,
                            source,
                        });
                    FlushOutcome {
                        destination,
                        operations,
                        result,
                    }
                }
                .instrument(span),
            );
        }

        let mut outcomes = Vec::with_capacity(dispatched.len());
        let mut join_failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => join_failures.push(join_error.to_string()),
            }
        }

        // A task that did not report is attributed to a destination that has
        // no outcome after the barrier.
        for (destination, operations) in dispatched {
            if outcomes
                .iter()
                .any(|outcome| outcome.destination == destination)
            {
                continue;
            }
            let detail = join_failures
                .pop()
                .unwrap_or_else(|| "task ended without reporting".to_string());
            outcomes.push(FlushOutcome {
                destination,
                operations,
                result: Err(BenchError::TaskJoin {
                    destination,
                    detail,
                }),
            });
        }

        outcomes.sort_by_key(|outcome| outcome.destination);
        outcomes
    }

    /// Flush pending writes one after another. Under fail-fast the chunk stops
    /// at the first failed flush.
    async fn dispatch_sequential(
        &self,
        chunk: ChunkIndex,
        writes: Vec<PendingWrite>,
    ) -> Vec<FlushOutcome> {
        let mut outcomes = Vec::with_capacity(writes.len());

        for write in writes {
            let destination = write.destination;
            let operations = write.payload.len();
            let span = info_span!("batched.task", chunk = %chunk, destination = %destination);
            let result = flush(&self.store, write)
                .instrument(span)
                .await
                .map_err(|source| BenchError::Store {
                    destination,
                    source,
                });

            let failed = result.is_err();
            outcomes.push(FlushOutcome {
                destination,
                operations,
                result,
            });
            if failed && self.policy == FailurePolicy::FailFast {
                break;
            }
        }

        outcomes
    }

    fn merge(
        &self,
        chunk: ChunkIndex,
        outcomes: Vec<FlushOutcome>,
        result: &mut RunResult,
    ) -> Result<(), BenchError> {
        for outcome in outcomes {
            let FlushOutcome {
                destination,
                operations,
                result: flushed,
            } = outcome;
            let key = StatKey::chunked(destination, chunk);

            match flushed {
                Ok(stat) => {
                    info!(
                        destination = %destination,
                        chunk = %chunk,
                        operations,
                        duration_ms = stat.duration.as_millis(),
                        "[batched.flush] wrote {operations} documents to {destination} in {:.3} seconds",
                        stat.duration.as_secs_f64()
                    );
                    result.record(key, stat);
                }
                Err(failure) => match self.policy {
                    FailurePolicy::FailFast => {
                        error!(
                            destination = %destination,
                            chunk = %chunk,
                            error = %failure,
                            "[batched.flush_failed] aborting run"
                        );
                        return Err(failure);
                    }
                    FailurePolicy::BestEffort => {
                        warn!(
                            destination = %destination,
                            chunk = %chunk,
                            operations,
                            error = %failure,
                            "[batched.flush_failed] flush failed, continuing with remaining writes"
                        );
                        result.record_failure(WriteFailure {
                            key,
                            operations,
                            reason: failure.to_string(),
                        });
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};
    use writebench_memory::InMemoryDocumentStore;
    use writebench_testing::FaultScriptStore;
    use writebench_types::{BulkWriteAck, Document, MessageKind, StoreError, UpsertOne};

    use crate::config::RecordCount;
    use crate::generator::generate_records;

    /// Store that holds every write for a moment and remembers the largest
    /// number of writes it saw in flight at once.
    #[derive(Clone, Default)]
    struct InFlightStore {
        inner: InMemoryDocumentStore,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl InFlightStore {
        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        async fn hold(&self) {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl DocumentStore for InFlightStore {
        async fn upsert_batch(
            &self,
            destination: Destination,
            operations: Vec<UpsertOne>,
        ) -> Result<BulkWriteAck, StoreError> {
            self.hold().await;
            self.inner.upsert_batch(destination, operations).await
        }

        async fn insert_batch(
            &self,
            destination: Destination,
            documents: Vec<Document>,
        ) -> Result<BulkWriteAck, StoreError> {
            self.hold().await;
            self.inner.insert_batch(destination, documents).await
        }

        async fn clear(&self, destination: Destination) -> Result<(), StoreError> {
            self.inner.clear(destination).await
        }

        async fn count(&self, destination: Destination) -> Result<usize, StoreError> {
            self.inner.count(destination).await
        }
    }

    /// Records whose kinds alternate, so every chunk of two or more records
    /// fills all three buckets.
    fn alternating(count: usize) -> Vec<Record> {
        let mut rng = StdRng::seed_from_u64(9);
        let mut records = generate_records(RecordCount::try_new(count).unwrap(), &mut rng);
        for (index, record) in records.iter_mut().enumerate() {
            record.kind = if index % 2 == 0 {
                MessageKind::Position
            } else {
                MessageKind::Surface
            };
        }
        records
    }

    fn chunk_size(size: usize) -> ChunkSize {
        ChunkSize::try_new(size).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stats_are_keyed_by_destination_and_chunk() {
        let writer = BatchedWriter::new(InMemoryDocumentStore::new(), chunk_size(4));

        let result = writer.write(&alternating(10)).await.unwrap();

        assert_eq!(result.chunk_count(), 3);
        assert_eq!(result.len(), 9);
        assert!(result.stats().all(|(key, _)| key.chunk.is_some()));
    }

    #[tokio::test]
    async fn sequential_dispatch_writes_in_destination_order() {
        let store = FaultScriptStore::new(InMemoryDocumentStore::new());
        let writer = BatchedWriter::new(store.clone(), chunk_size(5)).with_concurrency(false);

        let _ = writer.write(&alternating(5)).await.unwrap();

        let order: Vec<Destination> = store.calls().iter().map(|call| call.destination).collect();
        assert_eq!(order, Destination::ALL.to_vec());
    }

    #[tokio::test]
    async fn sequential_fail_fast_stops_at_the_failed_flush() {
        let store = FaultScriptStore::new(InMemoryDocumentStore::new())
            .fail_call(Destination::Flights, 1);
        let writer = BatchedWriter::new(store.clone(), chunk_size(4))
            .with_concurrency(false)
            .with_policy(FailurePolicy::FailFast);

        let error = writer.write(&alternating(12)).await.unwrap_err();

        assert!(matches!(
            error,
            BenchError::Store {
                destination: Destination::Flights,
                ..
            }
        ));
        // chunk 0 wrote all three, chunk 1 stopped after flights
        assert_eq!(store.calls().len(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_fail_fast_joins_the_chunk_before_aborting() {
        let store = FaultScriptStore::new(InMemoryDocumentStore::new())
            .fail_call(Destination::Surfaces, 0);
        let writer =
            BatchedWriter::new(store.clone(), chunk_size(4)).with_policy(FailurePolicy::FailFast);

        let error = writer.write(&alternating(12)).await.unwrap_err();

        assert!(error.is_write_failure());
        // every task of chunk 0 ran, no task of chunk 1 was spawned
        assert_eq!(store.calls().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn best_effort_keeps_writing_later_chunks() {
        let store = FaultScriptStore::new(InMemoryDocumentStore::new())
            .fail_call(Destination::Positions, 0);
        let writer = BatchedWriter::new(store.clone(), chunk_size(4));

        let result = writer.write(&alternating(12)).await.unwrap();

        assert_eq!(store.calls().len(), 9);
        assert_eq!(result.len(), 8);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(
            result.failures()[0].key,
            StatKey::chunked(Destination::Positions, ChunkIndex::new(0))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_chunks_keep_at_most_three_writes_in_flight() {
        // Given: ten chunks that each fill all three destinations
        let store = InFlightStore::default();
        let writer = BatchedWriter::new(store.clone(), chunk_size(10));

        // When
        let result = writer.write(&alternating(100)).await.unwrap();

        // Then: the writes of a chunk overlap, chunks never do
        assert_eq!(result.len(), 30);
        assert!(store.peak() > 1, "peak was {}", store.peak());
        assert!(store.peak() <= 3, "peak was {}", store.peak());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sequential_chunks_keep_one_write_in_flight() {
        let store = InFlightStore::default();
        let writer = BatchedWriter::new(store.clone(), chunk_size(10)).with_concurrency(false);

        let result = writer.write(&alternating(30)).await.unwrap();

        assert_eq!(result.len(), 9);
        assert_eq!(store.peak(), 1);
    }
}
