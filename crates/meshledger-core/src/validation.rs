//! Structural checks on values read back from disk.
//!
//! These checks need no keys and no other artifacts. Cryptographic and
//! cross-artifact checks live in the verifier.

use crate::capsule::SignatureSidecar;
use crate::crypto::HINT_LEN;
use crate::error::{CoreError, Result};
use crate::types::CapsuleId;

/// Minimum number of MACs on any sidecar: the artifact key and the org key.
pub const MIN_MACS: usize = 2;

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// A 64-character lowercase hex digest.
pub fn validate_hex_digest(s: &str) -> Result<()> {
    if s.len() == 64 && is_lower_hex(s) {
        Ok(())
    } else {
        Err(CoreError::InvalidDigest(s.to_string()))
    }
}

/// A parseable capsule id.
pub fn validate_capsule_id(s: &str) -> Result<CapsuleId> {
    CapsuleId::parse(s)
}

/// Sidecar shape: digest, at least two MACs, one well-formed hint per MAC.
pub fn validate_sidecar(sidecar: &SignatureSidecar) -> Result<()> {
    validate_hex_digest(&sidecar.sha256)
        .map_err(|_| CoreError::MalformedSidecar("sha256 is not a hex digest".into()))?;

    if sidecar.hmac.len() < MIN_MACS {
        return Err(CoreError::MalformedSidecar(format!(
            "expected at least {MIN_MACS} MACs, found {}",
            sidecar.hmac.len()
        )));
    }
    if sidecar.hmac.len() != sidecar.hint.len() {
        return Err(CoreError::MalformedSidecar(format!(
            "{} MACs but {} hints",
            sidecar.hmac.len(),
            sidecar.hint.len()
        )));
    }
    if let Some(mac) = sidecar.hmac.iter().find(|m| validate_hex_digest(m).is_err()) {
        return Err(CoreError::MalformedSidecar(format!("bad MAC {mac:?}")));
    }
    if let Some(hint) = sidecar
        .hint
        .iter()
        .find(|h| h.len() != HINT_LEN || !is_lower_hex(h))
    {
        return Err(CoreError::MalformedSidecar(format!("bad hint {hint:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidecar() -> SignatureSidecar {
        SignatureSidecar {
            ts: "2026-01-14T12:00:00Z".into(),
            sha256: "a".repeat(64),
            hmac: vec!["b".repeat(64), "c".repeat(64)],
            hint: vec!["0123456789ab".into(), "ba9876543210".into()],
        }
    }

    #[test]
    fn test_valid_sidecar() {
        assert!(validate_sidecar(&sidecar()).is_ok());
    }

    #[test]
    fn test_single_mac_rejected() {
        let mut s = sidecar();
        s.hmac.pop();
        s.hint.pop();
        assert!(matches!(validate_sidecar(&s), Err(CoreError::MalformedSidecar(_))));
    }

    #[test]
    fn test_hint_count_mismatch_rejected() {
        let mut s = sidecar();
        s.hint.pop();
        assert!(validate_sidecar(&s).is_err());
    }

    #[test]
    fn test_bad_hint_rejected() {
        let mut s = sidecar();
        s.hint[1] = "XYZ".into();
        assert!(validate_sidecar(&s).is_err());
    }

    #[test]
    fn test_hex_digest() {
        assert!(validate_hex_digest(&"0f".repeat(32)).is_ok());
        assert!(validate_hex_digest(&"0F".repeat(32)).is_err());
        assert!(validate_hex_digest("genesis").is_err());
    }

    #[test]
    fn test_capsule_id() {
        assert!(validate_capsule_id("IMESH-DRIP-SEG1-0a1b2c3d").is_ok());
        assert!(validate_capsule_id("IMESH-DRIP-SEG1").is_err());
    }
}
