//! Canonical artifact reads and writes.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use meshledger_core::{from_canonical, to_canonical_bytes};

use crate::error::{Result, StoreError};

/// Encode `value` canonically and write exactly those bytes.
///
/// Returns the written bytes so callers can hash them.
pub fn write_canonical<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Vec<u8>> {
    let bytes = to_canonical_bytes(value)?;
    write_bytes(path, &bytes)?;
    Ok(bytes)
}

/// Write raw bytes, replacing any existing file.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(StoreError::io(path))
}

/// Read a file's bytes.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(StoreError::io(path))
}

/// Read and decode a JSON artifact.
pub fn read_canonical<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_bytes(path)?;
    Ok(from_canonical(&bytes)?)
}

/// Append one newline-terminated line with a single `write`.
///
/// `line` must not contain a newline.
pub fn append_line(path: &Path, line: &[u8]) -> Result<()> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line);
    buf.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(StoreError::io(path))?;
    file.write_all(&buf).map_err(StoreError::io(path))
}

/// Encode `value` canonically and append it as one line.
pub fn append_canonical<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Vec<u8>> {
    let bytes = to_canonical_bytes(value)?;
    append_line(path, &bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_bytes_are_returned_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let bytes = write_canonical(&path, &serde_json::json!({"b": 1, "a": "ü"})).unwrap();
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert_eq!(bytes, "{\"b\":1,\"a\":\"ü\"}".as_bytes());
    }

    #[test]
    fn test_append_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_canonical(&path, &serde_json::json!({"n": 1})).unwrap();
        append_canonical(&path, &serde_json::json!({"n": 2})).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"n\":1}\n{\"n\":2}\n");
    }

    #[test]
    fn test_read_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_canonical::<serde_json::Value>(&dir.path().join("x")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
