use std::fmt;

use serde_json::json;
use writebench_types::{Destination, Document, DocumentStore, FlightId, StoreError, UpsertOne};

#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(scenario: &'static str, operation: &'static str, error: StoreError) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

pub type ContractTestResult = Result<(), ContractTestFailure>;

fn contract_flight_id(scenario: &'static str, index: usize) -> Result<FlightId, ContractTestFailure> {
    let raw = format!("C{index:05}");

    FlightId::try_new(raw.clone()).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct flight id `{raw}`: {error}"),
        )
    })
}

fn contract_document(flight_id: &FlightId, revision: usize) -> Document {
    json!({
        "flightid": flight_id.as_ref(),
        "posmsgtype": "position",
        "revision": revision,
    })
}

fn contract_upserts(
    scenario: &'static str,
    count: usize,
    revision: usize,
) -> Result<Vec<UpsertOne>, ContractTestFailure> {
    (0..count)
        .map(|index| {
            let flight_id = contract_flight_id(scenario, index)?;
            let document = contract_document(&flight_id, revision);
            Ok(UpsertOne::new(flight_id, document))
        })
        .collect()
}

async fn reset_all<S: DocumentStore>(scenario: &'static str, store: &S) -> ContractTestResult {
    for destination in Destination::ALL {
        store
            .clear(destination)
            .await
            .map_err(|error| ContractTestFailure::store_error(scenario, "clear", error))?;
    }
    Ok(())
}

async fn expect_count<S: DocumentStore>(
    scenario: &'static str,
    store: &S,
    destination: Destination,
    expected: usize,
) -> ContractTestResult {
    let observed = store
        .count(destination)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "count", error))?;

    if observed != expected {
        return Err(ContractTestFailure::assertion(
            scenario,
            format!("expected {destination} to hold {expected} documents, observed {observed}"),
        ));
    }

    Ok(())
}

/// Re-applying the same upsert batch leaves one document per identity.
pub async fn test_upsert_is_idempotent<S: DocumentStore>(store: &S) -> ContractTestResult {
    const SCENARIO: &str = "upsert_is_idempotent";
    const IDENTITIES: usize = 25;

    reset_all(SCENARIO, store).await?;

    for revision in 0..3 {
        let operations = contract_upserts(SCENARIO, IDENTITIES, revision)?;
        let ack = store
            .upsert_batch(Destination::Flights, operations)
            .await
            .map_err(|error| ContractTestFailure::store_error(SCENARIO, "upsert_batch", error))?;

        if ack.applied != IDENTITIES {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!(
                    "expected {IDENTITIES} applied upserts, store acknowledged {}",
                    ack.applied
                ),
            ));
        }
    }

    expect_count(SCENARIO, store, Destination::Flights, IDENTITIES).await
}

/// Duplicate identities inside one upsert batch collapse into one document.
pub async fn test_upsert_collapses_duplicates_within_batch<S: DocumentStore>(
    store: &S,
) -> ContractTestResult {
    const SCENARIO: &str = "upsert_collapses_duplicates_within_batch";

    reset_all(SCENARIO, store).await?;

    let flight_id = contract_flight_id(SCENARIO, 7)?;
    let operations = (0..4)
        .map(|revision| UpsertOne::new(flight_id.clone(), contract_document(&flight_id, revision)))
        .collect();

    let _ = store
        .upsert_batch(Destination::Flights, operations)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "upsert_batch", error))?;

    expect_count(SCENARIO, store, Destination::Flights, 1).await
}

/// Inserts carry no identity constraint: identical documents accumulate.
pub async fn test_insert_appends_without_identity_constraint<S: DocumentStore>(
    store: &S,
) -> ContractTestResult {
    const SCENARIO: &str = "insert_appends_without_identity_constraint";

    reset_all(SCENARIO, store).await?;

    let flight_id = contract_flight_id(SCENARIO, 1)?;
    for _ in 0..2 {
        let documents = vec![
            contract_document(&flight_id, 0),
            contract_document(&flight_id, 0),
        ];
        let _ = store
            .insert_batch(Destination::Positions, documents)
            .await
            .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_batch", error))?;
    }

    expect_count(SCENARIO, store, Destination::Positions, 4).await
}

/// Writes to one destination are invisible to the others, and clearing one
/// destination leaves the others intact.
pub async fn test_destinations_are_isolated<S: DocumentStore>(store: &S) -> ContractTestResult {
    const SCENARIO: &str = "destinations_are_isolated";

    reset_all(SCENARIO, store).await?;

    let operations = contract_upserts(SCENARIO, 3, 0)?;
    let flight_id = contract_flight_id(SCENARIO, 0)?;
    let _ = store
        .upsert_batch(Destination::Flights, operations)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "upsert_batch", error))?;
    let _ = store
        .insert_batch(Destination::Surfaces, vec![contract_document(&flight_id, 0)])
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_batch", error))?;

    expect_count(SCENARIO, store, Destination::Flights, 3).await?;
    expect_count(SCENARIO, store, Destination::Positions, 0).await?;
    expect_count(SCENARIO, store, Destination::Surfaces, 1).await?;

    store
        .clear(Destination::Flights)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "clear", error))?;

    expect_count(SCENARIO, store, Destination::Flights, 0).await?;
    expect_count(SCENARIO, store, Destination::Surfaces, 1).await
}

/// Empty batches are accepted and change nothing.
pub async fn test_empty_batches_are_noops<S: DocumentStore>(store: &S) -> ContractTestResult {
    const SCENARIO: &str = "empty_batches_are_noops";

    reset_all(SCENARIO, store).await?;

    let upserted = store
        .upsert_batch(Destination::Flights, Vec::new())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "upsert_batch", error))?;
    let inserted = store
        .insert_batch(Destination::Positions, Vec::new())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "insert_batch", error))?;

    if upserted.applied != 0 || inserted.applied != 0 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "empty batches acknowledged {} upserts and {} inserts",
                upserted.applied, inserted.applied
            ),
        ));
    }

    expect_count(SCENARIO, store, Destination::Flights, 0).await?;
    expect_count(SCENARIO, store, Destination::Positions, 0).await
}

#[macro_export]
macro_rules! document_store_contract_tests {
    (
        suite = $suite:ident,
        make_store = $make_store:expr
        $(, attributes = [$($attribute:meta),* $(,)?])?
        $(,)?
    ) => {
        mod $suite {
            use $crate::contract::{
                test_destinations_are_isolated, test_empty_batches_are_noops,
                test_insert_appends_without_identity_constraint,
                test_upsert_collapses_duplicates_within_batch, test_upsert_is_idempotent,
            };

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attribute])*)?
            async fn upsert_is_idempotent_contract() {
                test_upsert_is_idempotent(&$make_store())
                    .await
                    .expect("document store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attribute])*)?
            async fn upsert_collapses_duplicates_within_batch_contract() {
                test_upsert_collapses_duplicates_within_batch(&$make_store())
                    .await
                    .expect("document store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attribute])*)?
            async fn insert_appends_without_identity_constraint_contract() {
                test_insert_appends_without_identity_constraint(&$make_store())
                    .await
                    .expect("document store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attribute])*)?
            async fn destinations_are_isolated_contract() {
                test_destinations_are_isolated(&$make_store())
                    .await
                    .expect("document store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            $($(#[$attribute])*)?
            async fn empty_batches_are_noops_contract() {
                test_empty_batches_are_noops(&$make_store())
                    .await
                    .expect("document store contract failed");
            }
        }
    };
}

pub use document_store_contract_tests;
