//! Filesystem implementation of the ContentStore trait.
//!
//! Entries live at `{dir}/{sha}.bin`. Creation is exclusive, so an existing
//! entry is never rewritten and two writers racing on the same content both
//! succeed.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use meshledger_core::Sha256Hash;

use crate::error::{Result, StoreError};
use crate::traits::{ContentStore, InsertResult};

/// On-disk content-addressed store.
#[derive(Debug, Clone)]
pub struct FsCas {
    dir: PathBuf,
}

impl FsCas {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(StoreError::io(&dir))?;
        Ok(Self { dir })
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry for `sha`.
    pub fn entry_path(&self, sha: &Sha256Hash) -> PathBuf {
        self.dir.join(format!("{}.bin", sha.to_hex()))
    }
}

impl ContentStore for FsCas {
    fn insert(&self, bytes: &[u8]) -> Result<InsertResult> {
        let sha = Sha256Hash::hash(bytes);
        let path = self.entry_path(&sha);

        if path.exists() {
            tracing::debug!(sha = %sha, "cas hit");
            return Ok(InsertResult::AlreadyExists(sha));
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(InsertResult::AlreadyExists(sha));
            }
            Err(e) => return Err(StoreError::io(&path)(e)),
        };
        file.write_all(bytes).map_err(StoreError::io(&path))?;
        Ok(InsertResult::Inserted(sha))
    }

    fn get(&self, sha: &Sha256Hash) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(sha);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path)(e)),
        }
    }

    fn contains(&self, sha: &Sha256Hash) -> Result<bool> {
        Ok(self.entry_path(sha).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cas = FsCas::open(dir.path().join("cas")).unwrap();

        let first = cas.insert(b"hello").unwrap();
        let second = cas.insert(b"hello").unwrap();

        assert!(matches!(first, InsertResult::Inserted(_)));
        assert!(matches!(second, InsertResult::AlreadyExists(_)));
        assert_eq!(first.hash(), second.hash());
        assert_eq!(first.hash(), Sha256Hash::hash(b"hello"));
    }

    #[test]
    fn test_entry_layout_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let cas = FsCas::open(dir.path()).unwrap();

        let sha = cas.put_bytes(b"payload").unwrap();
        let path = dir.path().join(format!("{}.bin", sha.to_hex()));
        assert_eq!(fs::read(path).unwrap(), b"payload");
        assert_eq!(cas.get(&sha).unwrap().unwrap(), b"payload");
        assert!(cas.contains(&sha).unwrap());

        let missing = Sha256Hash::hash(b"missing");
        assert!(cas.get(&missing).unwrap().is_none());
        assert!(!cas.contains(&missing).unwrap());
    }

    #[test]
    fn test_put_file_matches_digest() {
        let dir = tempfile::tempdir().unwrap();
        let cas = FsCas::open(dir.path().join("cas")).unwrap();
        let file = dir.path().join("artifact.json");
        fs::write(&file, br#"{"a":1}"#).unwrap();

        let stored = cas.put_file(&file).unwrap();
        assert_eq!(stored, crate::digest_file(&file).unwrap());
    }

    #[test]
    fn test_existing_entry_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let cas = FsCas::open(dir.path()).unwrap();
        let sha = cas.put_bytes(b"x").unwrap();

        // Even a damaged entry stays as it is: the store is write-once.
        fs::write(cas.entry_path(&sha), b"damaged").unwrap();
        cas.put_bytes(b"x").unwrap();
        assert_eq!(cas.get(&sha).unwrap().unwrap(), b"damaged");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cas = FsCas::open(dir.path()).unwrap();
        let err = cas.put_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
