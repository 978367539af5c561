//! `writebench` - naive versus batched bulk writes against a document store
//!
//! The library writes the same set of flight position reports twice: once
//! with one bulk call per destination over the whole set ([`NaiveWriter`]),
//! and once chunk by chunk with the writes of each chunk dispatched as
//! concurrent tasks ([`BatchedWriter`]). The [`StrategyDriver`] runs both
//! against a [`DocumentStore`](writebench_types::DocumentStore), clearing
//! every destination before each run, and folds the two results into a
//! [`ComparisonReport`].
//!
//! ```no_run
//! use rand::{rngs::StdRng, SeedableRng};
//! use writebench::{generate_records, BenchConfig, StrategyDriver};
//! # async fn demo<S>(store: S) -> Result<(), writebench::BenchError>
//! # where S: writebench_types::DocumentStore + Clone + Send + Sync + 'static {
//! let config = BenchConfig::try_new(30_000, 5_000)?;
//! let records = generate_records(config.record_count, &mut StdRng::seed_from_u64(7));
//!
//! let mut driver = StrategyDriver::new(store, config);
//! let report = driver.run(&records).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod batched;
pub mod bucket;
pub mod config;
pub mod driver;
pub mod errors;
mod flush;
pub mod generator;
pub mod naive;
pub mod report;
pub mod stats;

pub use aggregate::{compare, ComparisonRow};
pub use batched::BatchedWriter;
pub use bucket::{chunks, plan_chunks, ChunkPlan, DestinationBuckets, PendingWrite, WritePayload};
pub use config::{
    BenchConfig, ChunkSize, ConfigurationError, FailurePolicy, RecordCount, DEFAULT_CHUNK_SIZE,
    DEFAULT_RECORD_COUNT, MAX_RECORD_COUNT,
};
pub use driver::{reset_destinations, DriverState, StrategyDriver};
pub use errors::{BenchError, BenchResult};
pub use generator::{generate_flight_id, generate_record, generate_records};
pub use naive::NaiveWriter;
pub use report::ComparisonReport;
pub use stats::{ChunkIndex, RunResult, StatKey, WriteFailure, WriteStat};
