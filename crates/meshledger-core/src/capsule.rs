//! Capsules: signed JSON bodies committing to a unit of work.
//!
//! A capsule body always has four fields, in this order: `capsule_id`, `ts`,
//! `provenance`, `payload`. The body is encoded once with
//! [`crate::canonical`], the bytes are hashed, and those same bytes are
//! written to disk. The hash never appears inside the body.
//!
//! Signing produces a separate sidecar carrying the body hash, one HMAC per
//! key (the segment/meta/hyper key first, then the org key), and a public
//! hint for each key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_digest;
use crate::crypto::{attest, DerivedKey, Sha256Hash};
use crate::error::Result;
use crate::types::CapsuleId;

/// A capsule body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capsule<P, Q> {
    pub capsule_id: CapsuleId,
    pub ts: String,
    pub provenance: P,
    pub payload: Q,
}

/// Provenance of a segment capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentProvenance {
    /// Body SHA of the previous segment capsule, or `"genesis"`.
    pub prev_sha256: String,
    /// The mesh chain digest before this segment.
    pub chain_prev: String,
    /// Merkle root over the segment's exec and SLA files.
    pub merkle_root: String,
}

/// Files a segment capsule commits to, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPayload {
    pub exec: String,
    pub sla: String,
    pub merkle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperProvenance {
    pub super_merkle: String,
    /// The mesh chain digest after its last segment.
    pub chain_root: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperPayload {
    pub segments: Vec<CapsuleId>,
    pub count: usize,
    /// The Merkle file listing every rolled-up artifact.
    pub merkle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperProvenance {
    pub hyper_merkle: String,
    /// Last chain digest of each mesh, in declared order.
    pub rings: Vec<String>,
}

/// One mesh inside the hyper capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperMeshEntry {
    pub mesh: String,
    pub capsule_id: CapsuleId,
    pub super_root: String,
    pub last_chain: String,
    pub segments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperPayload {
    pub meshes: Vec<HyperMeshEntry>,
    pub count: usize,
}

pub type SegmentCapsule = Capsule<SegmentProvenance, SegmentPayload>;
pub type SuperCapsule = Capsule<SuperProvenance, SuperPayload>;
pub type HyperCapsule = Capsule<HyperProvenance, HyperPayload>;

/// A capsule of unknown kind, as read back from disk.
pub type AnyCapsule = Capsule<Value, Value>;

impl<P: Serialize, Q: Serialize> Capsule<P, Q> {
    /// Encode and hash the body.
    pub fn seal(&self) -> Result<SealedCapsule> {
        let (bytes, sha256) = canonical_digest(self)?;
        Ok(SealedCapsule {
            id: self.capsule_id.clone(),
            bytes,
            sha256,
        })
    }
}

/// An encoded capsule body and its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCapsule {
    pub id: CapsuleId,
    /// Exactly the bytes written to `{capsule_id}.json`.
    pub bytes: Vec<u8>,
    pub sha256: Sha256Hash,
}

impl SealedCapsule {
    /// Sign the body with each key, in order.
    pub fn sign(&self, ts: &str, keys: &[&DerivedKey]) -> Result<SignatureSidecar> {
        let (hmac, hint) = attest(&self.bytes, keys)?;
        Ok(SignatureSidecar {
            ts: ts.to_string(),
            sha256: self.sha256.to_hex(),
            hmac,
            hint,
        })
    }
}

/// The `{capsule_id}.sig.json` sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSidecar {
    pub ts: String,
    pub sha256: String,
    pub hmac: Vec<String>,
    pub hint: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{from_canonical, recanonicalize};
    use crate::crypto::{Keyring, RootSecret};

    fn sample() -> SegmentCapsule {
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

    #[test]
    fn test_body_key_order() {
        let sealed = sample().seal().unwrap();
        let text = String::from_utf8(sealed.bytes).unwrap();
        let expected = format!(
            concat!(
                r#"{{"capsule_id":"IMESH-DRIP-SEG1-deadbeef","ts":"2026-01-14T12:00:00Z","#,
                r#""provenance":{{"prev_sha256":"genesis","chain_prev":"genesis","merkle_root":"{}"}},"#,
                r#""payload":{{"exec":"drip_seg_1_exec.json","sla":"drip_seg_1_sla.json","merkle":"drip_seg_1_merkle.json"}}}}"#
            ),
            "ab".repeat(32)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_seal_hash_and_roundtrip() {
        let sealed = sample().seal().unwrap();
        assert_eq!(sealed.sha256, Sha256Hash::hash(&sealed.bytes));
        assert_eq!(recanonicalize(&sealed.bytes).unwrap(), sealed.bytes);

        let back: SegmentCapsule = from_canonical(&sealed.bytes).unwrap();
        assert_eq!(back, sample());
        let any: AnyCapsule = from_canonical(&sealed.bytes).unwrap();
        assert_eq!(any.capsule_id, sample().capsule_id);
    }

    #[test]
    fn test_sidecar_lists_macs_and_hints_in_key_order() {
        let keyring = Keyring::new(RootSecret::parse("deadbeef"), "tn");
        let seg = keyring.segment("drip", 1).unwrap().seg;
        let org = keyring.org().unwrap();
        let sealed = sample().seal().unwrap();

        let sidecar = sealed.sign("2026-01-14T12:00:00Z", &[&seg, &org]).unwrap();
        assert_eq!(sidecar.sha256, sealed.sha256.to_hex());
        assert_eq!(sidecar.hmac.len(), 2);
        assert_eq!(sidecar.hmac[0], seg.mac_hex(&sealed.bytes).unwrap());
        assert_eq!(sidecar.hmac[1], org.mac_hex(&sealed.bytes).unwrap());
        assert_eq!(sidecar.hint, vec![seg.hint(), org.hint()]);
    }
}
