//! Error types for a ledger run.

use std::path::PathBuf;

use meshledger_core::{CoreError, PlannerError};
use meshledger_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during a run.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad configuration. Nothing has been written.
    #[error("config error: {0}")]
    Config(String),

    /// HKDF/HMAC failure. Fatal before any capsule is written.
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    /// A mesh cannot be planned. Only that mesh is skipped.
    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    /// A write failed.
    #[error("I/O error: {0}")]
    Io(#[from] StoreError),

    /// Encoding or decoding failure.
    #[error("core error: {0}")]
    Core(CoreError),
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::KeyDerivation(msg) => LedgerError::KeyDerivation(msg),
            CoreError::Planner(e) => LedgerError::Planner(e),
            other => LedgerError::Core(other),
        }
    }
}

impl LedgerError {
    /// The error kind reported on stderr.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Config(_) => "ConfigError",
            LedgerError::KeyDerivation(_) => "KeyDerivationError",
            LedgerError::Planner(_) => "PlannerError",
            LedgerError::Io(_) => "IOError",
            LedgerError::Core(_) => "EncodingError",
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        LedgerError::Config(msg.into())
    }
}

/// A verification failure, pointing at the artifact it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityError {
    /// A recomputed Merkle root does not match the recorded one.
    #[error("merkle mismatch in {}: expected {expected}, computed {actual}", .path.display())]
    MerkleMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// SHA256(body) does not match the sidecar.
    #[error("body hash mismatch in {}: sidecar {expected}, computed {actual}", .path.display())]
    BodyHashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A segment capsule does not link to its predecessor.
    #[error("chain mismatch in {} ({field}): expected {expected}, found {actual}", .path.display())]
    ChainBreak {
        path: PathBuf,
        field: String,
        expected: String,
        actual: String,
    },

    /// A ledger line fails its hash or `prev` link.
    #[error("ledger break in {} at line {line}: {reason}", .path.display())]
    LedgerBreak {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A recomputed HMAC does not match.
    #[error("MAC {index} mismatch in {}", .path.display())]
    SignatureMismatch { path: PathBuf, index: usize },

    /// A key hint does not match the key.
    #[error("hint {index} mismatch in {}", .path.display())]
    HintMismatch { path: PathBuf, index: usize },

    /// A referenced artifact does not exist.
    #[error("missing artifact {}", .path.display())]
    Missing { path: PathBuf },

    /// An artifact cannot be parsed or has the wrong shape.
    #[error("malformed artifact {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

impl IntegrityError {
    /// The artifact the failure was found in.
    pub fn path(&self) -> &PathBuf {
        match self {
            IntegrityError::MerkleMismatch { path, .. }
            | IntegrityError::BodyHashMismatch { path, .. }
            | IntegrityError::ChainBreak { path, .. }
            | IntegrityError::LedgerBreak { path, .. }
            | IntegrityError::SignatureMismatch { path, .. }
            | IntegrityError::HintMismatch { path, .. }
            | IntegrityError::Missing { path }
            | IntegrityError::Malformed { path, .. } => path,
        }
    }
}

/// A monetization simulator could not produce a result for a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonetizationError {
    #[error("mesh {mesh}: bandit has no arms")]
    NoArms { mesh: String },

    #[error("mesh {mesh}: auction has no bidders")]
    NoBidders { mesh: String },

    #[error("mesh {mesh}: no pricing tier covers {units} units")]
    NoTier { mesh: String, units: u64 },
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
