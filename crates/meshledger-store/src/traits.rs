//! ContentStore trait: the interface for content-addressed storage.
//!
//! Entries are keyed by the SHA-256 of their bytes, so an entry can never
//! conflict with another: the same key always means the same bytes.

use std::path::Path;

use meshledger_core::Sha256Hash;

use crate::error::{Result, StoreError};

/// Result of inserting bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The entry was created.
    Inserted(Sha256Hash),
    /// The entry already existed (idempotent, not an error).
    AlreadyExists(Sha256Hash),
}

impl InsertResult {
    /// The content hash, either way.
    pub fn hash(&self) -> Sha256Hash {
        match self {
            InsertResult::Inserted(h) | InsertResult::AlreadyExists(h) => *h,
        }
    }
}

/// A content-addressed store.
///
/// Implementations can be on disk or in memory. Inserts are idempotent and
/// concurrent inserts of identical content are safe.
pub trait ContentStore: Send + Sync {
    /// Insert bytes under their SHA-256.
    fn insert(&self, bytes: &[u8]) -> Result<InsertResult>;

    /// Get the bytes stored under a hash.
    fn get(&self, sha: &Sha256Hash) -> Result<Option<Vec<u8>>>;

    /// Check whether a hash is stored.
    fn contains(&self, sha: &Sha256Hash) -> Result<bool>;

    /// Insert bytes and return their hash.
    fn put_bytes(&self, bytes: &[u8]) -> Result<Sha256Hash> {
        self.insert(bytes).map(|r| r.hash())
    }

    /// Read a file and insert its content.
    fn put_file(&self, path: &Path) -> Result<Sha256Hash> {
        let bytes = std::fs::read(path).map_err(StoreError::io(path))?;
        self.put_bytes(&bytes)
    }
}

/// Hash a file's content without storing it.
pub fn digest_file(path: &Path) -> Result<Sha256Hash> {
    let bytes = std::fs::read(path).map_err(StoreError::io(path))?;
    Ok(Sha256Hash::hash(&bytes))
}
