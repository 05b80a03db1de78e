//! Integration test crate for the Strata distribution engine.
//!
//! This crate has no library code. It only contains integration tests that
//! drive the distribution keeper through the staking lifecycle across the
//! workspace crates (types, store, distribution).
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p strata-integration-tests
//! ```
