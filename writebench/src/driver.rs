//! Orchestration of one comparison: both strategies against the same store,
//! each starting from empty destinations.

use std::time::Instant;

use tracing::{error, info, instrument};
use uuid::Uuid;
use writebench_types::{Destination, DocumentStore, Record};

use crate::batched::BatchedWriter;
use crate::config::BenchConfig;
use crate::errors::BenchError;
use crate::naive::NaiveWriter;
use crate::report::ComparisonReport;

/// Lifecycle of a [`StrategyDriver`].
///
/// ```text
/// Init -> NaiveRun -> Reset -> BatchedRun -> Report -> Done
///   \________\__________\__________\-------> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Destinations are cleared before the first run.
    Init,
    NaiveRun,
    /// Destinations are cleared between the runs.
    Reset,
    BatchedRun,
    Report,
    Done,
    /// A fatal error ended the comparison; no report was produced.
    Aborted,
}

impl DriverState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Clear every destination of `store`.
pub async fn reset_destinations<S>(store: &S) -> Result<(), BenchError>
where
    S: DocumentStore + Sync,
{
    for destination in Destination::ALL {
        store
            .clear(destination)
            .await
            .map_err(|source| BenchError::Reset {
                destination,
                source,
            })?;
    }
    Ok(())
}

/// Runs the naive and the batched strategy one after the other and compares
/// them.
pub struct StrategyDriver<S> {
    store: S,
    config: BenchConfig,
    state: DriverState,
}

impl<S> StrategyDriver<S>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
{
    pub const fn new(store: S, config: BenchConfig) -> Self {
        Self {
            store,
            config,
            state: DriverState::Init,
        }
    }

    pub const fn state(&self) -> DriverState {
        self.state
    }

    pub const fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run the full comparison over `records`.
    ///
    /// Any error moves the driver to [`DriverState::Aborted`] and is returned
    /// without a report.
    #[instrument(name = "driver.run", skip(self, records), fields(records = records.len()))]
    pub async fn run(&mut self, records: &[Record]) -> Result<ComparisonReport, BenchError> {
        self.state = DriverState::Init;

        match self.execute(records).await {
            Ok(report) => {
                self.transition(DriverState::Done);
                Ok(report)
            }
            Err(failure) => {
                error!(
                    state = ?self.state,
                    error = %failure,
                    "[driver.aborted] comparison aborted"
                );
                self.transition(DriverState::Aborted);
                Err(failure)
            }
        }
    }

    async fn execute(&mut self, records: &[Record]) -> Result<ComparisonReport, BenchError> {
        reset_destinations(&self.store).await?;

        self.transition(DriverState::NaiveRun);
        let naive_writer =
            NaiveWriter::new(self.store.clone()).with_policy(self.config.naive_policy);
        let started = Instant::now();
        let mut naive = naive_writer.write(records).await?;
        naive.set_elapsed(started.elapsed());

        self.transition(DriverState::Reset);
        reset_destinations(&self.store).await?;

        self.transition(DriverState::BatchedRun);
        let batched_writer = BatchedWriter::new(self.store.clone(), self.config.chunk_size)
            .with_concurrency(self.config.concurrent)
            .with_policy(self.config.batched_policy);
        let started = Instant::now();
        let mut batched = batched_writer.write(records).await?;
        batched.set_elapsed(started.elapsed());

        self.transition(DriverState::Report);
        Ok(ComparisonReport::new(
            Uuid::now_v7(),
            records.len(),
            self.config.chunk_size,
            self.config.concurrent,
            &naive,
            &batched,
        ))
    }

    fn transition(&mut self, next: DriverState) {
        info!(
            from = ?self.state,
            to = ?next,
            "[driver.transition] {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}
