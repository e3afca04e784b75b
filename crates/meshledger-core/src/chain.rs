//! Chain state: the rolling per-mesh digest.
//!
//! `last` starts at `"genesis"` and advances once per written segment
//! capsule: `last := SHA256(last ":" body_sha)`, hashing the UTF-8 of the
//! hex strings joined by a colon.

use serde::{Deserialize, Serialize};

use crate::crypto::sha256_hex;
use crate::types::{CapsuleId, GENESIS};

/// One chain step: `SHA256(prev ":" body_sha)` as hex.
pub fn chain_step(prev: &str, body_sha: &str) -> String {
    sha256_hex(format!("{prev}:{body_sha}").as_bytes())
}

/// A segment recorded on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Segment number (1-indexed).
    pub seg: u32,
    /// The segment capsule id.
    pub cid: CapsuleId,
    /// SHA-256 of the capsule body.
    pub sha: String,
    /// `last` after this segment.
    pub chain: String,
}

/// Chain state of one mesh.
///
/// Owned by the mesh executor and persisted as `{mesh}_chain_state.json`
/// when the mesh finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub mesh: String,
    pub last: String,
    pub segments: Vec<ChainLink>,
}

impl ChainState {
    /// A fresh chain.
    pub fn new(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            last: GENESIS.to_string(),
            segments: Vec::new(),
        }
    }

    /// Body SHA of the latest segment capsule, or `"genesis"`.
    pub fn prev_sha(&self) -> &str {
        self.segments
            .last()
            .map(|link| link.sha.as_str())
            .unwrap_or(GENESIS)
    }

    /// Number of segments on the chain.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Record a written segment capsule and advance `last`.
    ///
    /// Returns the new `last`.
    pub fn advance(&mut self, seg: u32, cid: CapsuleId, body_sha: &str) -> &str {
        self.last = chain_step(&self.last, body_sha);
        self.segments.push(ChainLink {
            seg,
            cid,
            sha: body_sha.to_string(),
            chain: self.last.clone(),
        });
        &self.last
    }

    /// Ids of every segment capsule, in chain order.
    pub fn capsule_ids(&self) -> Vec<CapsuleId> {
        self.segments.iter().map(|link| link.cid.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(seg: u32) -> CapsuleId {
        CapsuleId::segment("IMESH", "drip", seg, "00000000")
    }

    #[test]
    fn test_fresh_chain() {
        let state = ChainState::new("drip");
        assert_eq!(state.last, GENESIS);
        assert_eq!(state.prev_sha(), GENESIS);
        assert!(state.is_empty());
    }

    #[test]
    fn test_two_step_formula() {
        let mut state = ChainState::new("drip");
        let sha1 = sha256_hex(b"body-1");
        let sha2 = sha256_hex(b"body-2");

        state.advance(1, cid(1), &sha1);
        assert_eq!(state.prev_sha(), sha1);
        state.advance(2, cid(2), &sha2);

        let first = sha256_hex(format!("genesis:{sha1}").as_bytes());
        let second = sha256_hex(format!("{first}:{sha2}").as_bytes());
        assert_eq!(state.last, second);
        assert_eq!(state.segments[0].chain, first);
        assert_eq!(state.segments[1].chain, second);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_state_json_shape() {
        let mut state = ChainState::new("drip");
        state.advance(1, cid(1), &sha256_hex(b"x"));
        let json = String::from_utf8(crate::to_canonical_bytes(&state).unwrap()).unwrap();
        assert!(json.starts_with(r#"{"mesh":"drip","last":""#));
        assert!(json.contains(r#""segments":[{"seg":1,"cid":"IMESH-DRIP-SEG1-00000000","sha":""#));
    }
}
