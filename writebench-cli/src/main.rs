//! `writebench` - runs the naive and the batched write strategy against one
//! store and prints how they compare.

mod args;
mod input;

use std::num::NonZeroU32;

use clap::Parser;
use miette::Diagnostic;
use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use writebench::{generate_records, BenchConfig, BenchError, ComparisonReport, StrategyDriver};
use writebench_memory::InMemoryDocumentStore;
use writebench_postgres::{
    MaxConnections, PostgresConfig, PostgresDocumentStore, PostgresDocumentStoreError,
};
use writebench_types::{DocumentStore, Record};

use crate::args::{Args, Backend};
use crate::input::{load_records, InputError};

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Input(#[from] InputError),

    #[error("the comparison did not complete")]
    #[diagnostic(code(writebench::run))]
    Bench(#[from] BenchError),

    #[error("could not prepare the postgres store")]
    #[diagnostic(code(writebench::postgres))]
    Postgres(#[from] PostgresDocumentStoreError),

    #[error("the postgres backend needs a connection string")]
    #[diagnostic(
        code(writebench::postgres::url),
        help("pass --database-url or set DATABASE_URL")
    )]
    MissingDatabaseUrl,

    #[error("--max-connections must be at least 1")]
    #[diagnostic(code(writebench::postgres::pool))]
    InvalidMaxConnections,

    #[error("could not encode the report as JSON")]
    #[diagnostic(code(writebench::report))]
    Report(#[from] serde_json::Error),
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn records_for(args: &Args) -> Result<Vec<Record>, CliError> {
    if let Some(path) = &args.input {
        let records = load_records(path)?;
        info!(path = %path.display(), records = records.len(), "[cli.input] loaded records");
        return Ok(records);
    }

    // Validate before spending time on generation.
    let config = BenchConfig::try_new(args.records, args.chunk_size).map_err(BenchError::from)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    Ok(generate_records(config.record_count, &mut rng))
}

fn config_for(args: &Args, records: &[Record]) -> Result<BenchConfig, CliError> {
    let config = BenchConfig::try_new(records.len(), args.chunk_size)
        .map_err(BenchError::from)?
        .with_concurrency(!args.sequential)
        .with_naive_policy(args.naive_policy.into())
        .with_batched_policy(args.batched_policy.into());
    Ok(config)
}

async fn compare<S>(
    store: S,
    config: BenchConfig,
    records: &[Record],
) -> Result<ComparisonReport, CliError>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
{
    let mut driver = StrategyDriver::new(store, config);
    Ok(driver.run(records).await?)
}

async fn connect_postgres(args: &Args) -> Result<PostgresDocumentStore, CliError> {
    let url = args
        .database_url
        .clone()
        .ok_or(CliError::MissingDatabaseUrl)?;
    let max_connections =
        NonZeroU32::new(args.max_connections).ok_or(CliError::InvalidMaxConnections)?;
    let config = PostgresConfig {
        max_connections: MaxConnections::new(max_connections),
        ..PostgresConfig::default()
    };

    let store = PostgresDocumentStore::with_config(url, config).await?;
    store.migrate().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_tracing();

    let records = records_for(&args)?;
    let config = config_for(&args, &records)?;
    info!(
        records = records.len(),
        chunk_size = %config.chunk_size,
        concurrent = config.concurrent,
        backend = ?args.backend,
        "[cli.start] starting comparison"
    );

    let report = match args.backend {
        Backend::Memory => compare(InMemoryDocumentStore::new(), config, &records).await?,
        Backend::Postgres => {
            let store = connect_postgres(&args).await?;
            compare(store, config, &records).await?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).map_err(CliError::from)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
