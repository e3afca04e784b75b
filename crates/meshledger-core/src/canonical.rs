//! Canonical JSON encoding for hashing and for writing.
//!
//! The canonical form is:
//! - compact: no whitespace, no space after `,` or `:`
//! - insertion ordered: struct fields in declaration order, map entries in
//!   the order they were inserted; keys are never sorted
//! - UTF-8: non-ASCII characters are written as-is, never `\u` escaped
//!
//! **CRITICAL**: the bytes that are hashed are the bytes that are written.
//! Every hashed artifact goes through [`to_canonical_bytes`] exactly once and
//! the resulting buffer is what lands on disk.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::crypto::Sha256Hash;
use crate::error::{CoreError, Result};

/// Encode a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CoreError::EncodingError(e.to_string()))
}

/// Encode a value and hash the encoding.
pub fn canonical_digest<T: Serialize + ?Sized>(value: &T) -> Result<(Vec<u8>, Sha256Hash)> {
    let bytes = to_canonical_bytes(value)?;
    let digest = Sha256Hash::hash(&bytes);
    Ok((bytes, digest))
}

/// Decode canonical JSON bytes.
pub fn from_canonical<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// Parse arbitrary JSON and re-encode it canonically.
///
/// For bytes produced by [`to_canonical_bytes`] this is the identity.
pub fn recanonicalize(bytes: &[u8]) -> Result<Vec<u8>> {
    let value: Value = from_canonical(bytes)?;
    to_canonical_bytes(&value)
}
