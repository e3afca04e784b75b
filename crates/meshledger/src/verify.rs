//! Verification of a run's output.
//!
//! The verifier only reads. Merkle roots are recomputed with
//! [`digest_file`], never through the CAS, and nothing is repaired.
//!
//! Checks:
//! - capsule body hash against its sidecar, sidecar shape, and (with keys)
//!   every MAC and hint
//! - Merkle roots: segment and super capsules against their Merkle file and
//!   the files it names; the hyper capsule against its super capsules
//! - chain continuity across each mesh's segment capsules
//! - the ledger: `line_sha`, canonical encoding and `prev` links, stopping at
//!   the first broken line
//! - one attestation per ledger line
//! - each ledger line's `sha256` against the capsule body it names

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use meshledger_core::{
    chain_step, from_canonical, merkle_root, recanonicalize, sha256_hex, to_canonical_bytes,
    validate_sidecar, AnyCapsule, CapsuleId, CapsuleKind, ChainState, DerivedKey, HyperPayload,
    HyperProvenance, Keyring, SignatureSidecar, GENESIS, MIN_MACS,
};
use meshledger_store::ledger::LINE_SHA_FIELD;
use meshledger_store::{
    digest_file, next_prev, read_ledger_lines, recompute_line_sha, Attestation, OutputLayout,
    StoreError,
};

use crate::error::{IntegrityError, Result};
use crate::records::MerkleFile;
use crate::rollup::hyper_merkle;

const CHAIN_STATE_SUFFIX: &str = "_chain_state.json";

/// Outcome of verifying a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub ok: bool,
    /// Whether MACs were recomputed.
    pub keyed: bool,
    pub ledger_lines: usize,
    pub capsules: usize,
    pub attestations: usize,
    pub errors: Vec<IntegrityError>,
}

/// A ledger line that passed its hash and link checks.
#[derive(Debug, Clone)]
pub struct VerifiedLine {
    pub number: usize,
    pub line: Map<String, Value>,
}

/// Result of walking a ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerScan {
    pub lines: Vec<VerifiedLine>,
    /// The first break, if any. Lines after it were not checked.
    pub error: Option<IntegrityError>,
}

struct Keys {
    keyring: Keyring,
    org: DerivedKey,
}

/// Read-only verifier over an output root.
pub struct Verifier {
    layout: OutputLayout,
    keys: Option<Keys>,
}

impl Verifier {
    /// Verify shapes and hashes only.
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            layout: OutputLayout::new(outdir.into()),
            keys: None,
        }
    }

    /// Also recompute every MAC and hint.
    pub fn with_keys(outdir: impl Into<PathBuf>, keyring: Keyring) -> Result<Self> {
        let org = keyring.org()?;
        Ok(Self {
            layout: OutputLayout::new(outdir.into()),
            keys: Some(Keys { keyring, org }),
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Verify a capsule body, its sidecar and its Merkle commitment.
    pub fn verify_capsule(&self, id: &CapsuleId) -> Vec<IntegrityError> {
        let mut errors = Vec::new();
        let path = self.layout.path(&OutputLayout::capsule(id));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => {
                errors.push(IntegrityError::Missing { path });
                return errors;
            }
        };
        let actual = sha256_hex(&bytes);

        let sidecar_path = self.layout.path(&OutputLayout::sidecar(id));
        match read_json::<SignatureSidecar>(&sidecar_path) {
            Err(e) => errors.push(e),
            Ok(sidecar) => {
                if let Err(e) = validate_sidecar(&sidecar) {
                    errors.push(IntegrityError::Malformed {
                        path: sidecar_path.clone(),
                        reason: e.to_string(),
                    });
                }
                if sidecar.sha256 != actual {
                    errors.push(IntegrityError::BodyHashMismatch {
                        path: path.clone(),
                        expected: sidecar.sha256.clone(),
                        actual: actual.clone(),
                    });
                }
                if let Some(keys) = &self.keys {
                    match capsule_key(&keys.keyring, id) {
                        Ok(key) => errors.extend(check_macs(
                            &sidecar_path,
                            &bytes,
                            &sidecar.hmac,
                            &sidecar.hint,
                            &[&key, &keys.org],
                        )),
                        Err(reason) => errors.push(IntegrityError::Malformed {
                            path: sidecar_path.clone(),
                            reason,
                        }),
                    }
                }
            }
        }

        let capsule: AnyCapsule = match from_canonical(&bytes) {
            Ok(capsule) => capsule,
            Err(e) => {
                errors.push(IntegrityError::Malformed {
                    path,
                    reason: e.to_string(),
                });
                return errors;
            }
        };
        if recanonicalize(&bytes).ok().as_deref() != Some(bytes.as_slice()) {
            errors.push(IntegrityError::Malformed {
                path: path.clone(),
                reason: "body is not canonically encoded".into(),
            });
        }
        if capsule.capsule_id != *id {
            errors.push(IntegrityError::Malformed {
                path: path.clone(),
                reason: format!("body names capsule {}", capsule.capsule_id),
            });
        }

        match id.kind() {
            Ok(CapsuleKind::Segment(_)) => {
                errors.extend(self.check_merkle(&path, &capsule, "merkle_root"))
            }
            Ok(CapsuleKind::Super) => {
                errors.extend(self.check_merkle(&path, &capsule, "super_merkle"))
            }
            Ok(CapsuleKind::Hyper) => errors.extend(self.check_hyper(&path, &capsule)),
            Err(e) => errors.push(IntegrityError::Malformed {
                path,
                reason: e.to_string(),
            }),
        }
        errors
    }

    /// Recompute a Merkle file from disk and compare it with the capsule.
    fn check_merkle(&self, path: &Path, capsule: &AnyCapsule, field: &str) -> Vec<IntegrityError> {
        let mut errors = Vec::new();
        let malformed = |reason: &str| IntegrityError::Malformed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let Some(recorded) = capsule.provenance.get(field).and_then(Value::as_str) else {
            return vec![malformed(&format!("provenance.{field} missing"))];
        };
        let Some(merkle_name) = capsule.payload.get("merkle").and_then(Value::as_str) else {
            return vec![malformed("payload.merkle missing")];
        };
        if !is_plain_name(merkle_name) {
            return vec![malformed("payload.merkle is not a plain file name")];
        }

        let merkle_path = self.layout.path(merkle_name);
        let merkle: MerkleFile = match read_json(&merkle_path) {
            Ok(m) => m,
            Err(e) => return vec![e],
        };
        if merkle.files.len() != merkle.hashes.len() {
            return vec![IntegrityError::Malformed {
                path: merkle_path,
                reason: format!(
                    "{} files but {} hashes",
                    merkle.files.len(),
                    merkle.hashes.len()
                ),
            }];
        }

        let mut digests = Vec::with_capacity(merkle.files.len());
        for (file, recorded_hash) in merkle.files.iter().zip(&merkle.hashes) {
            if !is_plain_name(file) {
                errors.push(IntegrityError::Malformed {
                    path: merkle_path.clone(),
                    reason: format!("{file:?} is not a plain file name"),
                });
                return errors;
            }
            let file_path = self.layout.path(file);
            let digest = match digest_file(&file_path) {
                Ok(d) => d,
                Err(_) => {
                    errors.push(IntegrityError::Missing { path: file_path });
                    return errors;
                }
            };
            if digest.to_hex() != *recorded_hash {
                errors.push(IntegrityError::MerkleMismatch {
                    path: merkle_path.clone(),
                    expected: recorded_hash.clone(),
                    actual: digest.to_hex(),
                });
            }
            digests.push(digest);
        }

        let computed = merkle_root(&digests).to_hex();
        if computed != merkle.root {
            errors.push(IntegrityError::MerkleMismatch {
                path: merkle_path,
                expected: merkle.root,
                actual: computed.clone(),
            });
        }
        if computed != recorded {
            errors.push(IntegrityError::MerkleMismatch {
                path: path.to_path_buf(),
                expected: recorded.to_string(),
                actual: computed,
            });
        }
        errors
    }

    /// Recompute the hyper root from the super capsules it names.
    fn check_hyper(&self, path: &Path, capsule: &AnyCapsule) -> Vec<IntegrityError> {
        let mut errors = Vec::new();
        let parsed = serde_json::from_value::<HyperProvenance>(capsule.provenance.clone())
            .and_then(|p| {
                serde_json::from_value::<HyperPayload>(capsule.payload.clone()).map(|q| (p, q))
            });
        let (provenance, payload) = match parsed {
            Ok(pq) => pq,
            Err(e) => {
                return vec![IntegrityError::Malformed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }]
            }
        };

        if payload.count != payload.meshes.len() {
            errors.push(IntegrityError::Malformed {
                path: path.to_path_buf(),
                reason: format!(
                    "count {} but {} meshes",
                    payload.count,
                    payload.meshes.len()
                ),
            });
        }

        for entry in &payload.meshes {
            let super_path = self.layout.path(&OutputLayout::capsule(&entry.capsule_id));
            let super_capsule: AnyCapsule = match read_json(&super_path) {
                Ok(c) => c,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let found = super_capsule
                .provenance
                .get("super_merkle")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if found != entry.super_root {
                errors.push(IntegrityError::MerkleMismatch {
                    path: super_path.clone(),
                    expected: entry.super_root.clone(),
                    actual: found.to_string(),
                });
            }
            let chain_root = super_capsule
                .provenance
                .get("chain_root")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if chain_root != entry.last_chain {
                errors.push(IntegrityError::ChainBreak {
                    path: super_path,
                    field: "chain_root".into(),
                    expected: entry.last_chain.clone(),
                    actual: chain_root.to_string(),
                });
            }
        }

        let roots: Vec<&str> = payload.meshes.iter().map(|m| m.super_root.as_str()).collect();
        let computed = hyper_merkle(&roots);
        if computed != provenance.hyper_merkle {
            errors.push(IntegrityError::MerkleMismatch {
                path: path.to_path_buf(),
                expected: provenance.hyper_merkle.clone(),
                actual: computed,
            });
        }
        let tips: Vec<&str> = payload.meshes.iter().map(|m| m.last_chain.as_str()).collect();
        if provenance.rings != tips {
            errors.push(IntegrityError::ChainBreak {
                path: path.to_path_buf(),
                field: "rings".into(),
                expected: tips.join(","),
                actual: provenance.rings.join(","),
            });
        }
        errors
    }

    /// Check `prev_sha256` and `chain_prev` across a mesh's segments.
    ///
    /// The chain is recomputed from the capsule bytes on disk, so a changed
    /// body shows up at the segment after it.
    pub fn verify_chain(&self, mesh: &str) -> Vec<IntegrityError> {
        let mut errors = Vec::new();
        let state_path = self.layout.path(&OutputLayout::chain_state(mesh));
        let state: ChainState = match read_json(&state_path) {
            Ok(s) => s,
            Err(e) => return vec![e],
        };

        let mut prev_sha = GENESIS.to_string();
        let mut chain = GENESIS.to_string();
        for link in &state.segments {
            let path = self.layout.path(&OutputLayout::capsule(&link.cid));
            let Ok(bytes) = fs::read(&path) else {
                errors.push(IntegrityError::Missing { path });
                prev_sha = link.sha.clone();
                chain = chain_step(&chain, &link.sha);
                continue;
            };
            let actual = sha256_hex(&bytes);

            if let Ok(capsule) = from_canonical::<AnyCapsule>(&bytes) {
                for (field, expected) in [("prev_sha256", &prev_sha), ("chain_prev", &chain)] {
                    let found = capsule
                        .provenance
                        .get(field)
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if found != expected.as_str() {
                        errors.push(IntegrityError::ChainBreak {
                            path: path.clone(),
                            field: field.to_string(),
                            expected: expected.clone(),
                            actual: found.to_string(),
                        });
                    }
                }
            }

            chain = chain_step(&chain, &actual);
            prev_sha = actual;
        }

        if state.last != chain {
            errors.push(IntegrityError::ChainBreak {
                path: state_path,
                field: "last".into(),
                expected: chain,
                actual: state.last,
            });
        }
        errors
    }

    /// Walk a ledger, stopping at the first break.
    pub fn verify_ledger(&self, ledger_name: &str) -> LedgerScan {
        let path = self.layout.path(ledger_name);
        let lines = match read_ledger_lines(&path) {
            Ok(lines) => lines,
            Err(_) => {
                return LedgerScan {
                    lines: Vec::new(),
                    error: Some(IntegrityError::Missing { path }),
                }
            }
        };

        let mut scan = LedgerScan::default();
        let mut expected_prev = GENESIS.to_string();
        for raw in lines {
            let brk = |reason: String| IntegrityError::LedgerBreak {
                path: path.clone(),
                line: raw.number,
                reason,
            };

            let line: Map<String, Value> = match serde_json::from_str(&raw.raw) {
                Ok(line) => line,
                Err(e) => {
                    scan.error = Some(brk(format!("not a JSON object: {e}")));
                    return scan;
                }
            };
            if to_canonical_bytes(&line).ok().as_deref() != Some(raw.raw.as_bytes()) {
                scan.error = Some(brk("line is not canonically encoded".into()));
                return scan;
            }
            let Some(recorded) = line.get(LINE_SHA_FIELD).and_then(Value::as_str) else {
                scan.error = Some(brk("line_sha missing".into()));
                return scan;
            };
            match recompute_line_sha(&line) {
                Ok(computed) if computed == recorded => {}
                Ok(computed) => {
                    scan.error = Some(brk(format!(
                        "line_sha {recorded} does not match computed {computed}"
                    )));
                    return scan;
                }
                Err(e) => {
                    scan.error = Some(brk(e.to_string()));
                    return scan;
                }
            }
            let prev = line.get("prev").and_then(Value::as_str).unwrap_or_default();
            if prev != expected_prev {
                scan.error = Some(brk(format!("prev {prev} does not follow {expected_prev}")));
                return scan;
            }

            let line = Value::Object(line);
            expected_prev = next_prev(&line);
            if let Value::Object(line) = line {
                scan.lines.push(VerifiedLine {
                    number: raw.number,
                    line,
                });
            }
        }
        scan
    }

    /// Check each verified ledger line has a well-formed attestation, and
    /// with keys, that its MACs and hints are right.
    ///
    /// Returns the number of attestations checked.
    pub fn verify_attestations(&self, lines: &[VerifiedLine]) -> (usize, Vec<IntegrityError>) {
        let mut errors = Vec::new();
        let mut files: HashMap<String, HashMap<String, Attestation>> = HashMap::new();
        let mut checked = 0;

        for verified in lines {
            let line = &verified.line;
            let mesh = line.get("mesh").and_then(Value::as_str).unwrap_or_default();
            let line_sha = line.get(LINE_SHA_FIELD).and_then(Value::as_str).unwrap_or_default();
            let attest_path = self.layout.path(&OutputLayout::attest(mesh));

            if !files.contains_key(mesh) {
                match load_attestations(&attest_path) {
                    Ok(index) => {
                        files.insert(mesh.to_string(), index);
                    }
                    Err(e) => {
                        errors.push(e);
                        files.insert(mesh.to_string(), HashMap::new());
                        continue;
                    }
                }
            }
            let Some(attestation) = files.get(mesh).and_then(|index| index.get(line_sha)) else {
                errors.push(IntegrityError::Malformed {
                    path: attest_path,
                    reason: format!("no attestation for ledger line {}", verified.number),
                });
                continue;
            };
            checked += 1;

            if attestation.hmac.len() < MIN_MACS || attestation.hmac.len() != attestation.hint.len() {
                errors.push(IntegrityError::Malformed {
                    path: attest_path,
                    reason: format!("attestation for line {} has the wrong shape", verified.number),
                });
                continue;
            }

            if let Some(keys) = &self.keys {
                let key = match ledger_key(&keys.keyring, line) {
                    Ok(key) => key,
                    Err(reason) => {
                        errors.push(IntegrityError::Malformed {
                            path: attest_path,
                            reason,
                        });
                        continue;
                    }
                };
                let mut unsigned = line.clone();
                unsigned.shift_remove(LINE_SHA_FIELD);
                match to_canonical_bytes(&unsigned) {
                    Ok(bytes) => errors.extend(check_macs(
                        &attest_path,
                        &bytes,
                        &attestation.hmac,
                        &attestation.hint,
                        &[&key, &keys.org],
                    )),
                    Err(e) => errors.push(IntegrityError::Malformed {
                        path: attest_path,
                        reason: e.to_string(),
                    }),
                }
            }
        }
        (checked, errors)
    }

    /// Meshes with a persisted chain state, sorted by name.
    pub fn meshes(&self) -> Result<Vec<String>> {
        let root = self.layout.root();
        let entries = fs::read_dir(root).map_err(StoreError::io(root))?;
        let mut meshes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io(root))?;
            if let Some(mesh) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(CHAIN_STATE_SUFFIX))
            {
                meshes.push(mesh.to_string());
            }
        }
        meshes.sort();
        Ok(meshes)
    }

    /// The body hash a ledger line recorded against the capsule on disk. A
    /// missing capsule is left to [`Verifier::verify_capsule`].
    fn check_recorded_sha(
        &self,
        id: &CapsuleId,
        line: &Map<String, Value>,
    ) -> Option<IntegrityError> {
        let path = self.layout.path(&OutputLayout::capsule(id));
        let bytes = fs::read(&path).ok()?;
        let recorded = line.get("sha256").and_then(Value::as_str).unwrap_or_default();
        let actual = sha256_hex(&bytes);
        (recorded != actual).then(|| IntegrityError::BodyHashMismatch {
            path,
            expected: recorded.to_string(),
            actual,
        })
    }

    /// Verify everything under the output root.
    ///
    /// Capsules come from every `{mesh}_chain_state.json` and from every
    /// ledger line that passed its checks.
    pub fn verify_run(&self, ledger_name: &str) -> Result<VerifyReport> {
        let mut report = VerifyReport {
            keyed: self.keys.is_some(),
            ..VerifyReport::default()
        };

        let scan = self.verify_ledger(ledger_name);
        report.ledger_lines = scan.lines.len();
        report.errors.extend(scan.error);

        let (attestations, errors) = self.verify_attestations(&scan.lines);
        report.attestations = attestations;
        report.errors.extend(errors);

        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for mesh in self.meshes()? {
            report.errors.extend(self.verify_chain(&mesh));
            let state_path = self.layout.path(&OutputLayout::chain_state(&mesh));
            if let Ok(state) = read_json::<ChainState>(&state_path) {
                for link in state.segments {
                    if seen.insert(link.cid.clone()) {
                        ids.push(link.cid);
                    }
                }
            }
        }
        for verified in &scan.lines {
            let id = verified
                .line
                .get("capsule_id")
                .and_then(Value::as_str)
                .map(CapsuleId::parse);
            match id {
                Some(Ok(id)) => {
                    report.errors.extend(self.check_recorded_sha(&id, &verified.line));
                    if seen.insert(id.clone()) {
                        ids.push(id);
                    }
                }
                _ => report.errors.push(IntegrityError::LedgerBreak {
                    path: self.layout.path(ledger_name),
                    line: verified.number,
                    reason: "capsule_id missing or malformed".into(),
                }),
            }
        }

        for id in &ids {
            report.errors.extend(self.verify_capsule(id));
        }
        report.capsules = ids.len();
        report.ok = report.errors.is_empty();
        Ok(report)
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.starts_with('.')
}

fn read_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, IntegrityError> {
    let bytes = fs::read(path).map_err(|_| IntegrityError::Missing {
        path: path.to_path_buf(),
    })?;
    from_canonical(&bytes).map_err(|e| IntegrityError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn load_attestations(
    path: &Path,
) -> std::result::Result<HashMap<String, Attestation>, IntegrityError> {
    let lines = read_ledger_lines(path).map_err(|_| IntegrityError::Missing {
        path: path.to_path_buf(),
    })?;
    let mut index = HashMap::new();
    for line in lines {
        let attestation: Attestation =
            serde_json::from_str(&line.raw).map_err(|e| IntegrityError::Malformed {
                path: path.to_path_buf(),
                reason: format!("line {}: {e}", line.number),
            })?;
        index.insert(attestation.line_sha.clone(), attestation);
    }
    Ok(index)
}

/// The artifact key that signed a capsule.
fn capsule_key(keyring: &Keyring, id: &CapsuleId) -> std::result::Result<DerivedKey, String> {
    let kind = id.kind().map_err(|e| e.to_string())?;
    let mesh = id.mesh();
    let key = match (kind, mesh) {
        (CapsuleKind::Segment(seg), Some(mesh)) => keyring.segment(&mesh, seg).map(|k| k.seg),
        (CapsuleKind::Super, Some(mesh)) => keyring.meta(&mesh),
        (CapsuleKind::Hyper, _) => keyring.hyper(),
        _ => return Err(format!("cannot tell which key signed {id}")),
    };
    key.map_err(|e| e.to_string())
}

/// The artifact key that attested a ledger line.
fn ledger_key(keyring: &Keyring, line: &Map<String, Value>) -> std::result::Result<DerivedKey, String> {
    let mesh = line.get("mesh").and_then(Value::as_str).unwrap_or_default();
    let key = match line.get("event").and_then(Value::as_str) {
        Some("segment") => {
            let seg = line
                .get("seg")
                .and_then(Value::as_u64)
                .and_then(|s| u32::try_from(s).ok())
                .ok_or_else(|| "segment line without seg".to_string())?;
            keyring.segment(mesh, seg).map(|k| k.led)
        }
        Some("super") => keyring.meta(mesh),
        Some("hyper") => keyring.hyper(),
        other => return Err(format!("unknown ledger event {other:?}")),
    };
    key.map_err(|e| e.to_string())
}

/// Compare MACs and hints, key by key.
fn check_macs(
    path: &Path,
    message: &[u8],
    macs: &[String],
    hints: &[String],
    keys: &[&DerivedKey],
) -> Vec<IntegrityError> {
    let mut errors = Vec::new();
    for (index, key) in keys.iter().enumerate() {
        if hints.get(index) != Some(&key.hint()) {
            errors.push(IntegrityError::HintMismatch {
                path: path.to_path_buf(),
                index,
            });
        }
        let expected = key.mac_hex(message).ok();
        if expected.is_none() || macs.get(index) != expected.as_ref() {
            errors.push(IntegrityError::SignatureMismatch {
                path: path.to_path_buf(),
                index,
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshledger_core::RootSecret;
    use tempfile::TempDir;

    fn keyring() -> Keyring {
        Keyring::new(RootSecret::parse("deadbeef"), "tn")
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("drip_seg_1_exec.json"));
        assert!(!is_plain_name("../etc/passwd"));
        assert!(!is_plain_name("cas/abc.bin"));
        assert!(!is_plain_name("a\\b"));
        assert!(!is_plain_name(""));
    }

    #[test]
    fn test_check_macs_reports_each_index() {
        let keyring = keyring();
        let org = keyring.org().unwrap();
        let hyper = keyring.hyper().unwrap();
        let path = Path::new("x.sig.json");
        let macs = vec![hyper.mac_hex(b"msg").unwrap(), org.mac_hex(b"msg").unwrap()];
        let hints = vec![hyper.hint(), org.hint()];

        assert!(check_macs(path, b"msg", &macs, &hints, &[&hyper, &org]).is_empty());

        let errors = check_macs(path, b"other", &macs, &hints, &[&hyper, &org]);
        assert_eq!(
            errors,
            vec![
                IntegrityError::SignatureMismatch { path: path.into(), index: 0 },
                IntegrityError::SignatureMismatch { path: path.into(), index: 1 },
            ]
        );

        let swapped = vec![hints[1].clone(), hints[0].clone()];
        let errors = check_macs(path, b"msg", &macs, &swapped, &[&hyper, &org]);
        assert!(errors.iter().all(|e| matches!(e, IntegrityError::HintMismatch { .. })));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_capsule_key_by_kind() {
        let keyring = keyring();
        let seg = CapsuleId::segment("IMESH", "drip", 2, "0000000a");
        let sup = CapsuleId::super_capsule("IMESH", "drip", "0000000b");
        let hyp = CapsuleId::hyper("IMESH", "0000000c");

        assert_eq!(capsule_key(&keyring, &seg).unwrap(), keyring.segment("drip", 2).unwrap().seg);
        assert_eq!(capsule_key(&keyring, &sup).unwrap(), keyring.meta("drip").unwrap());
        assert_eq!(capsule_key(&keyring, &hyp).unwrap(), keyring.hyper().unwrap());
    }

    #[test]
    fn test_missing_ledger() {
        let dir = TempDir::new().unwrap();
        let scan = Verifier::new(dir.path()).verify_ledger("ledger_main.jsonl");
        assert!(scan.lines.is_empty());
        assert!(matches!(scan.error, Some(IntegrityError::Missing { .. })));
    }

    #[test]
    fn test_missing_capsule() {
        let dir = TempDir::new().unwrap();
        let id = CapsuleId::segment("IMESH", "drip", 1, "deadbeef");
        let errors = Verifier::new(dir.path()).verify_capsule(&id);
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], IntegrityError::Missing { path } if path.ends_with("IMESH-DRIP-SEG1-deadbeef.json")));
    }

    #[test]
    fn test_empty_root_verifies_nothing() {
        let dir = TempDir::new().unwrap();
        let verifier = Verifier::new(dir.path());
        assert!(verifier.meshes().unwrap().is_empty());
        let report = verifier.verify_run("ledger_main.jsonl").unwrap();
        assert!(!report.ok);
        assert_eq!(report.capsules, 0);
    }
}
