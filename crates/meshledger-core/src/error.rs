//! Error types for the mesh ledger core.

use thiserror::Error;

/// Core errors that can occur while hashing, deriving keys, or encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid hex digest: {0}")]
    InvalidDigest(String),

    #[error("malformed capsule id: {0}")]
    MalformedCapsuleId(String),

    #[error("malformed sidecar: {0}")]
    MalformedSidecar(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),
}

/// Errors raised when a mesh definition cannot be ordered into a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("mesh {mesh}: cycle through capability {capability}")]
    Cycle { mesh: String, capability: String },

    #[error("mesh {mesh}: root verb is empty")]
    EmptyVerb { mesh: String },

    #[error("mesh {mesh}: invalid capability name {capability:?}")]
    InvalidCapability { mesh: String, capability: String },

    #[error("invalid mesh name {0:?}: expected [a-z0-9_]+")]
    InvalidMeshName(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
