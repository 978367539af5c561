#![forbid(
    dead_code,
    invalid_value,
    overflowing_literals,
    unconditional_recursion,
    unreachable_pub,
    unused_allocation,
    unsafe_code
)]
#![deny(
    bad_style,
    deprecated,
    meta_variable_misuse,
    non_ascii_idents,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unused_assignments,
    unused_attributes,
    unused_extern_crates,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_qualifications,
    unused_results,
    unused_variables
)]

//! Shared vocabulary types and traits for the writebench workspace.
//!
//! This crate provides the foundational types shared between the core
//! `writebench` crate and store adapters like `writebench-postgres`.
//!
//! # Overview
//!
//! This crate contains:
//! - Record model: `Record`, `FlightId`, `MessageKind`, `Document`
//! - Destinations: `Destination`, `WriteMode`
//! - Store port: `DocumentStore`, `UpsertOne`, `BulkWriteAck`
//! - Errors: `StoreError`, `Operation`, `OperationFailure`, `TranslationError`

mod record;
mod store;
mod validation;

pub use record::{
    Document, FlightId, MessageKind, Record, TranslationError, FLIGHT_ID_FIELD, KIND_FIELD,
};
pub use store::{
    BulkWriteAck, Destination, DocumentStore, Operation, OperationFailure, StoreError, UpsertOne,
    WriteMode,
};
pub use validation::FLIGHT_ID_LEN;
