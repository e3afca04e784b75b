//! # Mesh Ledger Store
//!
//! Filesystem persistence for the mesh ledger.
//!
//! ## Overview
//!
//! Everything a run produces lives under one output root. This crate owns
//! the naming of those files ([`OutputLayout`]), the content-addressed store
//! behind the [`ContentStore`] trait, canonical artifact writes, and the
//! append-only [`LedgerWriter`].
//!
//! ## Key Types
//!
//! - [`ContentStore`] - The trait for content-addressed storage
//! - [`FsCas`] - `cas/{sha}.bin` on disk
//! - [`MemoryCas`] - In-memory store for tests
//! - [`LedgerWriter`] - Hash-chained JSONL ledger with HMAC attestations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use meshledger_store::{ContentStore, FsCas, OutputLayout};
//!
//! let layout = OutputLayout::new("./ledger");
//! layout.ensure().unwrap();
//! let cas = FsCas::open(layout.cas_dir()).unwrap();
//! let sha = cas.put_bytes(b"hello").unwrap();
//! assert!(cas.contains(&sha).unwrap());
//! ```
//!
//! ## Design Notes
//!
//! - **Write-once CAS**: an entry is created exclusively; an existing entry is never rewritten
//! - **Atomic appends**: every ledger and attestation line is one `write` of a newline-terminated buffer
//! - **Hash what you write**: artifacts are encoded once and those bytes are written verbatim

pub mod artifacts;
pub mod error;
pub mod fs;
pub mod layout;
pub mod ledger;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use fs::FsCas;
pub use layout::OutputLayout;
pub use ledger::{
    next_prev, read_ledger_lines, recompute_line_sha, Attestation, LedgerEntry, LedgerEvent,
    LedgerLine, LedgerRecord, LedgerWriter,
};
pub use memory::MemoryCas;
pub use traits::{digest_file, ContentStore, InsertResult};
