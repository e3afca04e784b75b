//! # Mesh Ledger Testkit
//!
//! Testing utilities for the mesh ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known key derivation, Merkle and encoding outputs
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Deterministic run configurations in temporary directories
//!
//! ## Golden Vectors
//!
//! ```rust
//! use meshledger_testkit::vectors::{key_vectors, verify_key_vectors};
//!
//! for (name, ok, hint) in verify_key_vectors() {
//!     assert!(ok, "{name}: {hint}");
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use meshledger_testkit::fixtures::RunFixture;
//!
//! let fixture = RunFixture::solo(1, 1);
//! let summary = fixture.run().unwrap();
//! assert!(summary.ok);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{RunFixture, FIXED_EPOCH, TEST_SECRET, TEST_SEED};
