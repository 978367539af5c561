use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use writebench::{FailurePolicy, DEFAULT_CHUNK_SIZE, DEFAULT_RECORD_COUNT};

/// Store backend the comparison writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-process store; nothing leaves the process.
    Memory,
    /// PostgreSQL tables holding JSONB documents.
    Postgres,
}

/// Reaction of one strategy to a failed flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    FailFast,
    BestEffort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::FailFast => Self::FailFast,
            PolicyArg::BestEffort => Self::BestEffort,
        }
    }
}

/// Compare naive and batched bulk writes of flight position reports.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Number of synthetic records to generate
    #[arg(long, env = "WRITEBENCH_RECORDS", default_value_t = DEFAULT_RECORD_COUNT)]
    pub records: usize,

    /// Records per chunk for the batched strategy
    #[arg(long, env = "WRITEBENCH_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Flush the buckets of a chunk one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Seed for reproducible record generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Store backend to write to
    #[arg(long, value_enum, default_value_t = Backend::Memory)]
    pub backend: Backend,

    /// PostgreSQL connection string (postgres backend only)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Size of the PostgreSQL connection pool
    #[arg(long, default_value_t = 10)]
    pub max_connections: u32,

    /// Failure policy of the naive strategy
    #[arg(long, value_enum, default_value_t = PolicyArg::FailFast)]
    pub naive_policy: PolicyArg,

    /// Failure policy of the batched strategy
    #[arg(long, value_enum, default_value_t = PolicyArg::BestEffort)]
    pub batched_policy: PolicyArg,

    /// Read records from a newline-delimited JSON file instead of generating them
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}
