//! PostgreSQL backend for writebench.
//!
//! Each destination is a table holding JSONB documents. `flights` is keyed by
//! flight identity and written with a single `INSERT ... ON CONFLICT DO
//! UPDATE` per batch; `positions` and `surfaces` are append-only and written
//! with a single multi-row `INSERT` per batch. Both statements unnest array
//! parameters, so one batch is one round trip regardless of its size.

use std::collections::HashMap;
use std::time::Duration;

use nutype::nutype;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, query, Pool, Postgres, Row};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use writebench_types::{
    BulkWriteAck, Destination, Document, DocumentStore, Operation, StoreError, UpsertOne,
    WriteMode,
};

/// Errors raised while preparing a [`PostgresDocumentStore`].
#[derive(Debug, Error)]
pub enum PostgresDocumentStoreError {
    /// The connection pool could not reach the database.
    #[error("failed to create postgres connection pool")]
    ConnectionFailed(#[source] sqlx::Error),

    /// The destination tables could not be created.
    #[error("failed to apply writebench migrations")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Maximum number of database connections in the pool.
///
/// The batched writer keeps at most three flushes in flight, so pools larger
/// than three only matter when several benchmarks share one store.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(std::num::NonZeroU32);

/// Configuration for the connection pool of [`PostgresDocumentStore`].
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30 seconds)
    pub acquire_timeout: Duration,
    /// Idle timeout for connections in the pool (default: 10 minutes)
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600), // 10 minutes
        }
    }
}

const UPSERT_FLIGHTS: &str = "INSERT INTO writebench_flights (flight_id, document)
     SELECT * FROM UNNEST($1::text[], $2::jsonb[])
     ON CONFLICT (flight_id) DO UPDATE
     SET document = EXCLUDED.document, updated_at = now()";

const fn table(destination: Destination) -> &'static str {
    match destination {
        Destination::Flights => "writebench_flights",
        Destination::Positions => "writebench_positions",
        Destination::Surfaces => "writebench_surfaces",
    }
}

const fn insert_statement(destination: Destination) -> &'static str {
    match destination {
        Destination::Flights => "",
        Destination::Positions => {
            "INSERT INTO writebench_positions (document) SELECT * FROM UNNEST($1::jsonb[])"
        }
        Destination::Surfaces => {
            "INSERT INTO writebench_surfaces (document) SELECT * FROM UNNEST($1::jsonb[])"
        }
    }
}

const fn truncate_statement(destination: Destination) -> &'static str {
    match destination {
        Destination::Flights => "TRUNCATE TABLE writebench_flights",
        Destination::Positions => "TRUNCATE TABLE writebench_positions",
        Destination::Surfaces => "TRUNCATE TABLE writebench_surfaces",
    }
}

const fn count_statement(destination: Destination) -> &'static str {
    match destination {
        Destination::Flights => "SELECT COUNT(*) AS documents FROM writebench_flights",
        Destination::Positions => "SELECT COUNT(*) AS documents FROM writebench_positions",
        Destination::Surfaces => "SELECT COUNT(*) AS documents FROM writebench_surfaces",
    }
}

/// Collapse duplicate identities so that the last occurrence wins, keeping
/// first-seen order. A single `ON CONFLICT DO UPDATE` statement cannot touch
/// the same row twice.
fn last_write_wins(operations: Vec<UpsertOne>) -> (Vec<String>, Vec<Value>) {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(operations.len());
    let mut ids: Vec<String> = Vec::with_capacity(operations.len());
    let mut documents: Vec<Value> = Vec::with_capacity(operations.len());

    for UpsertOne {
        filter,
        replacement,
    } in operations
    {
        let id = filter.into_inner();
        match positions.get(&id) {
            Some(&slot) => documents[slot] = replacement,
            None => {
                let _ = positions.insert(id.clone(), ids.len());
                ids.push(id);
                documents.push(replacement);
            }
        }
    }

    (ids, documents)
}

fn applied(rows_affected: u64) -> usize {
    usize::try_from(rows_affected).unwrap_or(usize::MAX)
}

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Pool<Postgres>,
}

impl PostgresDocumentStore {
    /// Create a new PostgresDocumentStore with default configuration.
    pub async fn new<S: Into<String>>(
        connection_string: S,
    ) -> Result<Self, PostgresDocumentStoreError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Create a new PostgresDocumentStore with custom configuration.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresDocumentStoreError> {
        let connection_string = connection_string.into();
        let max_connections: std::num::NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string)
            .await
            .map_err(PostgresDocumentStoreError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Create a PostgresDocumentStore from an existing connection pool.
    pub const fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create the destination tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), PostgresDocumentStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(PostgresDocumentStoreError::MigrationFailed)
    }

    fn reject_mode(destination: Destination, operation: Operation) -> StoreError {
        warn!(
            destination = %destination,
            operation = %operation,
            "[postgres.write_mode] destination does not accept this kind of write"
        );
        StoreError::StoreFailure {
            operation,
            destination,
        }
    }
}

impl DocumentStore for PostgresDocumentStore {
    #[instrument(name = "postgres.upsert_batch", skip(self, operations), fields(operations = operations.len()))]
    async fn upsert_batch(
        &self,
        destination: Destination,
        operations: Vec<UpsertOne>,
    ) -> Result<BulkWriteAck, StoreError> {
        if destination.write_mode() != WriteMode::Upsert {
            return Err(Self::reject_mode(destination, Operation::UpsertBatch));
        }
        if operations.is_empty() {
            return Ok(BulkWriteAck { applied: 0 });
        }

        let (ids, documents) = last_write_wins(operations);
        debug!(
            destination = %destination,
            identities = ids.len(),
            "[postgres.upsert_batch] upserting documents"
        );

        let result = query(UPSERT_FLIGHTS)
            .bind(ids)
            .bind(documents)
            .execute(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::UpsertBatch, destination))?;

        Ok(BulkWriteAck {
            applied: applied(result.rows_affected()),
        })
    }

    #[instrument(name = "postgres.insert_batch", skip(self, documents), fields(documents = documents.len()))]
    async fn insert_batch(
        &self,
        destination: Destination,
        documents: Vec<Document>,
    ) -> Result<BulkWriteAck, StoreError> {
        if destination.write_mode() != WriteMode::Insert {
            return Err(Self::reject_mode(destination, Operation::InsertBatch));
        }
        if documents.is_empty() {
            return Ok(BulkWriteAck { applied: 0 });
        }

        debug!(
            destination = %destination,
            table = table(destination),
            "[postgres.insert_batch] inserting documents"
        );

        let result = query(insert_statement(destination))
            .bind(documents)
            .execute(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::InsertBatch, destination))?;

        Ok(BulkWriteAck {
            applied: applied(result.rows_affected()),
        })
    }

    #[instrument(name = "postgres.clear", skip(self))]
    async fn clear(&self, destination: Destination) -> Result<(), StoreError> {
        info!(
            destination = %destination,
            table = table(destination),
            "[postgres.clear] truncating destination"
        );

        let _ = query(truncate_statement(destination))
            .execute(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::Clear, destination))?;
        Ok(())
    }

    async fn count(&self, destination: Destination) -> Result<usize, StoreError> {
        let row = query(count_statement(destination))
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::Count, destination))?;
        let documents: i64 = row
            .try_get("documents")
            .map_err(|error| map_sqlx_error(error, Operation::Count, destination))?;

        Ok(usize::try_from(documents).unwrap_or(0))
    }
}

fn map_sqlx_error(error: sqlx::Error, operation: Operation, destination: Destination) -> StoreError {
    error!(
        error = %error,
        operation = %operation,
        destination = %destination,
        "[postgres.database_error] database operation failed"
    );
    StoreError::StoreFailure {
        operation,
        destination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use writebench_types::FlightId;

    fn upsert(id: &str, version: u32) -> UpsertOne {
        UpsertOne::new(
            FlightId::try_new(id).unwrap(),
            json!({ "flightid": id, "version": version }),
        )
    }

    #[test]
    fn duplicate_identities_keep_the_last_document_in_first_seen_order() {
        let (ids, documents) = last_write_wins(vec![
            upsert("AAAAAA", 1),
            upsert("BBBBBB", 1),
            upsert("AAAAAA", 2),
        ]);

        assert_eq!(ids, vec!["AAAAAA".to_string(), "BBBBBB".to_string()]);
        assert_eq!(documents[0]["version"], 2);
        assert_eq!(documents[1]["version"], 1);
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = PostgresConfig::default();

        let max: std::num::NonZeroU32 = config.max_connections.into();
        assert_eq!(max.get(), 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn statements_target_their_own_table() {
        for destination in Destination::ALL {
            assert!(truncate_statement(destination).ends_with(table(destination)));
            assert!(count_statement(destination).ends_with(table(destination)));
        }
        assert!(insert_statement(Destination::Positions).contains(table(Destination::Positions)));
        assert!(insert_statement(Destination::Surfaces).contains(table(Destination::Surfaces)));
    }
}
