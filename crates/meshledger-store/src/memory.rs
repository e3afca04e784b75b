//! In-memory implementation of the ContentStore trait.
//!
//! Same semantics as [`crate::FsCas`] without persistence. Thread-safe via
//! RwLock.

use std::collections::HashMap;
use std::sync::RwLock;

use meshledger_core::Sha256Hash;

use crate::error::{Result, StoreError};
use crate::traits::{ContentStore, InsertResult};

/// In-memory content-addressed store.
#[derive(Debug, Default)]
pub struct MemoryCas {
    entries: RwLock<HashMap<Sha256Hash, Vec<u8>>>,
}

impl MemoryCas {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }
}

impl ContentStore for MemoryCas {
    fn insert(&self, bytes: &[u8]) -> Result<InsertResult> {
        let sha = Sha256Hash::hash(bytes);
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        if entries.contains_key(&sha) {
            Ok(InsertResult::AlreadyExists(sha))
        } else {
            entries.insert(sha, bytes.to_vec());
            Ok(InsertResult::Inserted(sha))
        }
    }

    fn get(&self, sha: &Sha256Hash) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(entries.get(sha).cloned())
    }

    fn contains(&self, sha: &Sha256Hash) -> Result<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(entries.contains_key(sha))
    }
}
