//! Single-threaded strategy: one flush per destination over the full record
//! set.

use tracing::{info, instrument, warn};
use writebench_types::{DocumentStore, Record};

use crate::bucket::DestinationBuckets;
use crate::config::FailurePolicy;
use crate::errors::BenchError;
use crate::flush::flush;
use crate::stats::{RunResult, StatKey, WriteFailure};

/// Writes the whole record set with one call per destination.
///
/// Buckets are flushed in the order flights, positions, surfaces. Under
/// [`FailurePolicy::FailFast`] (the default) the first failed flush ends the
/// run and destinations already written are left as they are.
#[derive(Debug, Clone)]
pub struct NaiveWriter<S> {
    store: S,
    policy: FailurePolicy,
}

impl<S> NaiveWriter<S>
where
    S: DocumentStore + Sync,
{
    pub const fn new(store: S) -> Self {
        Self {
            store,
            policy: FailurePolicy::FailFast,
        }
    }

    /// Reaction to a failed flush; [`FailurePolicy::FailFast`] by default.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Partition `records` once and flush each non-empty bucket.
    #[instrument(name = "naive.write", skip(self, records), fields(records = records.len(), policy = %self.policy))]
    pub async fn write(&self, records: &[Record]) -> Result<RunResult, BenchError> {
        let writes = DestinationBuckets::partition(records)?.into_pending_writes();
        let mut result = RunResult::new();

        for write in writes {
            let destination = write.destination;
            let operations = write.payload.len();
            let key = StatKey::whole(destination);

            match flush(&self.store, write).await {
                Ok(stat) => {
                    info!(
                        destination = %destination,
                        operations,
                        duration_ms = stat.duration.as_millis(),
                        "[naive.flush] wrote {operations} documents to {destination} in {:.3} seconds",
                        stat.duration.as_secs_f64()
                    );
                    result.record(key, stat);
                }
                Err(source) => match self.policy {
                    FailurePolicy::FailFast => {
                        return Err(BenchError::Store {
                            destination,
                            source,
                        });
                    }
                    FailurePolicy::BestEffort => {
                        warn!(
                            destination = %destination,
                            operations,
                            error = %source,
                            "[naive.flush_failed] flush failed, continuing"
                        );
                        result.record_failure(WriteFailure {
                            key,
                            operations,
                            reason: source.to_string(),
                        });
                    }
                },
            }
        }

        Ok(result)
    }
}
