//! Golden test vectors for deterministic verification.
//!
//! All key vectors use the root secret `deadbeef` (hex, four bytes) and the
//! seed `tn`.

use meshledger_core::{
    merkle_root, sha256_hex, to_canonical_bytes, Capsule, CapsuleId, Keyring, RootSecret,
    SegmentPayload, SegmentProvenance, Sha256Hash,
};

use crate::fixtures::{TEST_SECRET, TEST_SEED};

/// Which key a vector derives.
#[derive(Debug, Clone, Copy)]
pub enum KeySource {
    Org,
    Hyper,
    Meta(&'static str),
    SegmentSign(&'static str, u32),
    SegmentLedger(&'static str, u32),
}

/// A golden key derivation vector.
#[derive(Debug, Clone)]
pub struct KeyVector {
    pub name: &'static str,
    pub source: KeySource,
    /// Expected key bytes (hex).
    pub expected_key: &'static str,
    /// Expected hint.
    pub expected_hint: &'static str,
}

/// Key derivation vectors.
pub fn key_vectors() -> Vec<KeyVector> {
    vec![
        KeyVector {
            name: "org",
            source: KeySource::Org,
            expected_key: "ebd70247ea98fbdca7817702392eff443f399c3620f8be0a1b4e20ae3a371a85",
            expected_hint: "b927ec24f4f2",
        },
        KeyVector {
            name: "hyper",
            source: KeySource::Hyper,
            expected_key: "23e457bf3b43b97c72428ee3d88999bc20a81865d5ab7e2f5abb4676bbf018dc",
            expected_hint: "e4506c264299",
        },
        KeyVector {
            name: "drip meta",
            source: KeySource::Meta("drip"),
            expected_key: "c240302dd603d768e4216e870bd01262b8c3f6dcc0dd6053fbdcc63758b50089",
            expected_hint: "44220697199c",
        },
        KeyVector {
            name: "drip segment 1 signing",
            source: KeySource::SegmentSign("drip", 1),
            expected_key: "e8a594f21390308baa508d67b15bf0139f4a6d0cc0f706cbab639edb2276076a",
            expected_hint: "eb66e71a82ff",
        },
        KeyVector {
            name: "drip segment 1 ledger",
            source: KeySource::SegmentLedger("drip", 1),
            expected_key: "a1ec2410a90aedad66b74fde4ee1a1f74810110ee52e13d2fb36b99668686a6b",
            expected_hint: "7a8ee973751f",
        },
    ]
}

/// The keyring every vector is derived from.
pub fn vector_keyring() -> Keyring {
    Keyring::new(RootSecret::parse(TEST_SECRET), TEST_SEED)
}

/// Derive each vector's key. Returns `(name, matches, hint)`.
pub fn verify_key_vectors() -> Vec<(String, bool, String)> {
    let keyring = vector_keyring();
    key_vectors()
        .iter()
        .map(|v| {
            let key = match v.source {
                KeySource::Org => keyring.org(),
                KeySource::Hyper => keyring.hyper(),
                KeySource::Meta(mesh) => keyring.meta(mesh),
                KeySource::SegmentSign(mesh, seg) => keyring.segment(mesh, seg).map(|k| k.seg),
                KeySource::SegmentLedger(mesh, seg) => keyring.segment(mesh, seg).map(|k| k.led),
            };
            match key {
                Ok(key) => {
                    let hint = key.hint();
                    let matches = hex::encode(key.as_bytes()) == v.expected_key
                        && hint == v.expected_hint;
                    (v.name.to_string(), matches, hint)
                }
                Err(e) => (v.name.to_string(), false, e.to_string()),
            }
        })
        .collect()
}

/// A golden Merkle vector over `SHA256(tag)` leaves.
#[derive(Debug, Clone)]
pub struct MerkleVector {
    pub name: &'static str,
    pub leaves: &'static [&'static str],
    pub expected_root: &'static str,
}

pub fn merkle_vectors() -> Vec<MerkleVector> {
    vec![
        MerkleVector {
            name: "empty",
            leaves: &[],
            expected_root: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
        MerkleVector {
            name: "single",
            leaves: &["a"],
            expected_root: "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
        },
        MerkleVector {
            name: "pair",
            leaves: &["a", "b"],
            expected_root: "e5a01fee14e0ed5c48714f22180f25ad8365b53f9779f79dc4a3d7e93963f94a",
        },
        MerkleVector {
            name: "odd",
            leaves: &["a", "b", "c"],
            expected_root: "d31a37ef6ac14a2db1470c4316beb5592e6afd4465022339adafda76a18ffabe",
        },
    ]
}

/// Compute a Merkle vector's root as hex.
pub fn compute_merkle_vector(vector: &MerkleVector) -> String {
    let leaves: Vec<Sha256Hash> = vector
        .leaves
        .iter()
        .map(|tag| Sha256Hash::hash(tag.as_bytes()))
        .collect();
    merkle_root(&leaves).to_hex()
}

/// SHA-256 of the canonical body of [`sample_segment_capsule`].
pub const SAMPLE_SEGMENT_SHA: &str =
    "a13f7249e29324ebce644dd128cfe2aa26dc43e2f73c0703e8bc53bc23964e5a";

/// A fixed first segment capsule of mesh `drip`.
pub fn sample_segment_capsule() -> Capsule<SegmentProvenance, SegmentPayload> {
    Capsule {
        capsule_id: CapsuleId::segment("IMESH", "drip", 1, "deadbeef"),
        ts: "2026-01-14T12:00:00Z".into(),
        provenance: SegmentProvenance {
            prev_sha256: "genesis".into(),
            chain_prev: "genesis".into(),
            merkle_root: "ab".repeat(32),
        },
        payload: SegmentPayload {
            exec: "drip_seg_1_exec.json".into(),
            sla: "drip_seg_1_sla.json".into(),
            merkle: "drip_seg_1_merkle.json".into(),
        },
    }
}

/// `SHA256("genesis:" || SHA256("body-1"))`, the first chain step.
pub const FIRST_CHAIN_STEP: &str =
    "130b046135a1f560c526d9e7af8369a45852cab3d8c7134d34b34c9ee6534837";

/// Body SHA fed into [`FIRST_CHAIN_STEP`].
pub fn first_chain_body_sha() -> String {
    sha256_hex(b"body-1")
}

/// Canonical bytes of the sample capsule.
pub fn sample_segment_bytes() -> Vec<u8> {
    to_canonical_bytes(&sample_segment_capsule()).unwrap_or_default()
}
