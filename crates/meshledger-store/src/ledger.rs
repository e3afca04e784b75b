//! The hash-chained ledger.
//!
//! One JSON object per line. Each line carries `prev`, the `sha256` of the
//! line before it (or `"genesis"`), and `line_sha`, the SHA-256 of the
//! line's own canonical encoding with `line_sha` left out. Every line gets a
//! matching attestation line in a per-mesh `.sig.jsonl` file, MACed over
//! those same bytes.
//!
//! Lines are never rewritten. The writer only appends.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use meshledger_core::{
    attest, canonical_digest, to_canonical_bytes, CapsuleId, DerivedKey, Sha256Hash, GENESIS,
};

use crate::artifacts::{append_canonical, append_line};
use crate::error::{Result, StoreError};

/// Field holding a line's own hash.
pub const LINE_SHA_FIELD: &str = "line_sha";

/// Kind of artifact a ledger line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEvent {
    Segment,
    Super,
    Hyper,
}

impl LedgerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEvent::Segment => "segment",
            LedgerEvent::Super => "super",
            LedgerEvent::Hyper => "hyper",
        }
    }
}

/// What a caller asks to append.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub mesh: String,
    pub event: LedgerEvent,
    pub capsule_id: CapsuleId,
    /// Body SHA of the capsule being recorded.
    pub sha256: String,
    /// Event-specific fields, written after `prev` in insertion order.
    pub extra: Map<String, Value>,
}

impl LedgerEntry {
    pub fn new(
        mesh: impl Into<String>,
        event: LedgerEvent,
        capsule_id: CapsuleId,
        sha256: impl Into<String>,
    ) -> Self {
        Self {
            mesh: mesh.into(),
            event,
            capsule_id,
            sha256: sha256.into(),
            extra: Map::new(),
        }
    }

    /// Add an extra field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// One ledger line as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub ts: String,
    pub mesh: String,
    pub event: LedgerEvent,
    pub capsule_id: CapsuleId,
    pub sha256: String,
    pub prev: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_sha: Option<String>,
}

/// One line of a `{mesh}_ledger_attest.sig.jsonl` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub ts: String,
    pub line_sha: String,
    pub hmac: Vec<String>,
    pub hint: Vec<String>,
}

/// A non-empty line read back from a JSONL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLine {
    /// 1-based line number in the file.
    pub number: usize,
    pub raw: String,
}

/// Read every non-empty line of a JSONL file.
pub fn read_ledger_lines(path: &Path) -> Result<Vec<LedgerLine>> {
    let text = fs::read_to_string(path).map_err(StoreError::io(path))?;
    Ok(text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| LedgerLine {
            number: i + 1,
            raw: line.to_string(),
        })
        .collect())
}

/// Recompute `line_sha` for a parsed ledger line.
///
/// Re-encodes the object without its `line_sha` field, keeping the order of
/// every other field.
pub fn recompute_line_sha(line: &Map<String, Value>) -> Result<String> {
    let mut body = line.clone();
    body.shift_remove(LINE_SHA_FIELD);
    let (_, digest) = canonical_digest(&body)?;
    Ok(digest.to_hex())
}

/// The `prev` the line after `line` must carry: its `sha256`, else its
/// `provenance.sha256`, else `"genesis"`.
pub fn next_prev(line: &Value) -> String {
    line.get("sha256")
        .and_then(Value::as_str)
        .or_else(|| {
            line.get("provenance")
                .and_then(|p| p.get("sha256"))
                .and_then(Value::as_str)
        })
        .unwrap_or(GENESIS)
        .to_string()
}

/// Appends hash-chained lines to one ledger file.
///
/// Not internally synchronized: share it behind a `Mutex` when meshes run on
/// several threads.
#[derive(Debug)]
pub struct LedgerWriter {
    path: PathBuf,
    tail: String,
    lines: usize,
}

impl LedgerWriter {
    /// Open a ledger, picking up the tail of any existing lines.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                tail: GENESIS.to_string(),
                lines: 0,
            });
        }

        let lines = read_ledger_lines(&path)?;
        let tail = match lines.last() {
            None => GENESIS.to_string(),
            Some(last) => {
                let value: Value =
                    serde_json::from_str(&last.raw).map_err(|e| StoreError::CorruptLedger {
                        path: path.clone(),
                        line: last.number,
                        reason: e.to_string(),
                    })?;
                next_prev(&value)
            }
        };
        debug!(path = %path.display(), lines = lines.len(), %tail, "opened ledger");

        Ok(Self {
            path,
            tail,
            lines: lines.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `prev` the next line will carry.
    pub fn tail(&self) -> &str {
        &self.tail
    }

    /// Number of lines in the file.
    pub fn len(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Append one line and its attestation.
    ///
    /// `keys` are the artifact key (K_LED, META or HYPER) and the org key, in
    /// that order. The attestation goes out first, so a failed attestation
    /// write leaves the ledger and the tail untouched.
    pub fn append(
        &mut self,
        ts: &str,
        entry: LedgerEntry,
        attest_path: &Path,
        keys: &[&DerivedKey],
    ) -> Result<LedgerRecord> {
        let mut record = LedgerRecord {
            ts: ts.to_string(),
            mesh: entry.mesh,
            event: entry.event,
            capsule_id: entry.capsule_id,
            sha256: entry.sha256,
            prev: self.tail.clone(),
            extra: entry.extra,
            line_sha: None,
        };

        let unsigned = to_canonical_bytes(&record)?;
        let line_sha = Sha256Hash::hash(&unsigned).to_hex();
        record.line_sha = Some(line_sha.clone());

        let line = to_canonical_bytes(&record)?;

        let (hmac, hint) = attest(&unsigned, keys)?;
        let attestation = Attestation {
            ts: ts.to_string(),
            line_sha,
            hmac,
            hint,
        };
        append_canonical(attest_path, &attestation)?;

        append_line(&self.path, &line)?;
        self.tail = record.sha256.clone();
        self.lines += 1;

        debug!(
            event = record.event.as_str(),
            capsule = %record.capsule_id,
            line = self.lines,
            "ledger append"
        );
        Ok(record)
    }
}
