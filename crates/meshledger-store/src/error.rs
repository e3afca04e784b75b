//! Error types for the store module.

use std::path::{Path, PathBuf};

use meshledger_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error on a specific path.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding error from the core.
    #[error("encoding error: {0}")]
    Core(#[from] CoreError),

    /// The ledger file cannot be appended to.
    #[error("corrupt ledger {} at line {line}: {reason}", .path.display())]
    CorruptLedger {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A shared lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    /// Map an I/O error onto the path it happened at.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
