//! # Mesh Ledger
//!
//! Runs simulated capability meshes and records every segment of work as a
//! signed, hash-chained capsule, then rolls the segments up per mesh (super
//! capsules) and per run (the hyper capsule).
//!
//! ## Overview
//!
//! - **Segments**: each segment simulates its cycles, writes exec and SLA
//!   files, commits to them with a Merkle root and signs a capsule chained
//!   to the previous segment
//! - **Roll-ups**: a super capsule commits to a mesh's Merkle files and
//!   segment capsules; the hyper capsule commits to every super root
//! - **Ledger**: an append-only JSONL file where each line hashes its own
//!   content and links to the line before it
//! - **Verification**: [`verify::Verifier`] recomputes everything from disk
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshledger::config::Config;
//! use meshledger::verify::Verifier;
//!
//! fn example() -> anyhow::Result<()> {
//!     let config = Config {
//!         outdir: "out".into(),
//!         segments: 2,
//!         cycles: 3,
//!         ..Config::default()
//!     };
//!     let summary = meshledger::run(config)?;
//!     assert!(summary.ok);
//!
//!     let report = Verifier::new("out").verify_run("ledger_main.jsonl")?;
//!     assert!(report.ok);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod executor;
pub mod graph;
pub mod monetize;
pub mod records;
pub mod rollup;
pub mod run;
pub mod signer;
pub mod verify;

pub use config::{Config, RunArgs};
pub use context::RunContext;
pub use error::{IntegrityError, LedgerError, MonetizationError, Result};
pub use run::{run, RunSummary};
pub use verify::{Verifier, VerifyReport};

/// Re-export of the primitives crate.
pub use meshledger_core as core;
/// Re-export of the storage crate.
pub use meshledger_store as store;
