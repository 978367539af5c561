//! writebench Benchmarks
//!
//! Criterion benchmarks of the naive and the batched write strategy against
//! the in-memory document store, across record counts and chunk sizes.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
