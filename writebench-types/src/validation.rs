//! Shared validation predicates for domain types.
//!
//! This module contains validation functions used by nutype-based domain types
//! across the writebench crates.

/// Number of characters in a generated flight identifier.
pub const FLIGHT_ID_LEN: usize = 6;

/// Validation predicate: exactly six characters drawn from `[A-Z0-9]`.
pub(crate) fn is_flight_id(s: &str) -> bool {
    s.len() == FLIGHT_ID_LEN
        && s
            .bytes()
            .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
}
