//! Test utilities and helpers for Parley
//!
//! Available to unit tests and, through the `test-utils` feature, to
//! integration tests and downstream crates.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
