//! Cryptographic primitives: SHA-256 hashing, HMAC-SHA256 attestation, and
//! HKDF key derivation from the run's root secret.
//!
//! The scheme attests that artifacts were produced by a holder of the root
//! secret. It does not authenticate external parties.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of every derived key, in bytes.
pub const KEY_LEN: usize = 32;

/// Length of a key hint, in hex characters.
pub const HINT_LEN: usize = 12;

/// Info prefix for labelled derivations.
const INFO_PREFIX: &str = "IMESH:";

/// A 32-byte SHA-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// Compute the SHA-256 hash of data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hash the concatenation of two digests' raw bytes.
    pub fn hash_pair(left: &Self, right: &Self) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(format!("{s:?}: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidDigest(format!("{s:?}: expected 32 bytes")))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA256({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Sha256Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// SHA-256 of `data`, as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256Hash::hash(data).to_hex()
}

/// HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CoreError::KeyDerivation(format!("hmac key rejected: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// First twelve hex digits of SHA256(key). Safe to publish.
pub fn key_hint(key: &[u8]) -> String {
    let mut hex = sha256_hex(key);
    hex.truncate(HINT_LEN);
    hex
}

/// HMAC `message` under each key, in order.
///
/// Returns the hex MACs and the matching key hints.
pub fn attest(message: &[u8], keys: &[&DerivedKey]) -> Result<(Vec<String>, Vec<String>)> {
    let macs = keys
        .iter()
        .map(|key| key.mac_hex(message))
        .collect::<Result<Vec<_>>>()?;
    let hints = keys.iter().map(|key| key.hint()).collect();
    Ok((macs, hints))
}

/// The root secret every key is derived from.
///
/// Never serialized; `Debug` prints only its length.
#[derive(Clone)]
pub struct RootSecret(Vec<u8>);

impl RootSecret {
    /// Interpret a configured secret.
    ///
    /// A valid even-length hex string is decoded; anything else is taken as
    /// raw UTF-8 bytes. An empty string yields 64 fresh random bytes.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::random();
        }
        if raw.len() % 2 == 0 {
            if let Ok(bytes) = hex::decode(raw) {
                return Self(bytes);
            }
        }
        Self(raw.as_bytes().to_vec())
    }

    /// 64 bytes from the operating system RNG.
    pub fn random() -> Self {
        let mut bytes = vec![0u8; 64];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap raw secret bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootSecret({} bytes)", self.0.len())
    }
}

/// A 32-byte key produced by HKDF-Expand.
///
/// `Debug` prints the hint, never the key.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// HMAC-SHA256 of `message` under this key, as hex.
    pub fn mac_hex(&self, message: &[u8]) -> Result<String> {
        hmac_sha256(&self.0, message).map(hex::encode)
    }

    /// Public hint for this key.
    pub fn hint(&self) -> String {
        key_hint(&self.0)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey(hint={})", self.hint())
    }
}

/// The two keys derived for one segment.
#[derive(Debug, Clone)]
pub struct SegmentKeys {
    /// Signs the segment capsule body.
    pub seg: DerivedKey,
    /// Attests the segment's ledger line.
    pub led: DerivedKey,
}

/// Key derivation for a run.
///
/// Holds the root secret and the `SEED` string that is folded into
/// per-segment labels.
#[derive(Debug, Clone)]
pub struct Keyring {
    root: RootSecret,
    seed: String,
}

impl Keyring {
    /// Create a keyring over a root secret and seed.
    pub fn new(root: RootSecret, seed: impl Into<String>) -> Self {
        Self {
            root,
            seed: seed.into(),
        }
    }

    /// The seed string folded into segment labels.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Derive the key for `label`.
    ///
    /// `salt = hex(SHA256("salt:" || label))` is used as the bytes of its
    /// hex encoding; `PRK = HMAC(salt, root)`; the key is
    /// `HKDF-Expand(PRK, "IMESH:" || label, 32)`.
    pub fn derive(&self, label: &str) -> Result<DerivedKey> {
        let salt = sha256_hex(format!("salt:{label}").as_bytes());
        let info = format!("{INFO_PREFIX}{label}");
        self.expand(salt.as_bytes(), info.as_bytes())
    }

    /// The organisation key, co-signing every artifact.
    pub fn org(&self) -> Result<DerivedKey> {
        self.derive("ORG")
    }

    /// The meta key for a mesh's super capsule.
    pub fn meta(&self, mesh: &str) -> Result<DerivedKey> {
        self.derive(&format!("{mesh}-META"))
    }

    /// The key for the run's hyper capsule.
    pub fn hyper(&self) -> Result<DerivedKey> {
        self.derive("HYPER")
    }

    /// The signing and ledger keys for segment `seg` of `mesh`.
    ///
    /// `PRK_seg = HMAC(hex(SHA256("{MESH}:{seg}:{SEED}")), root)`, with the
    /// mesh name upper-cased.
    pub fn segment(&self, mesh: &str, seg: u32) -> Result<SegmentKeys> {
        let salt = sha256_hex(
            format!("{}:{}:{}", mesh.to_ascii_uppercase(), seg, self.seed).as_bytes(),
        );
        Ok(SegmentKeys {
            seg: self.expand(salt.as_bytes(), b"SEG")?,
            led: self.expand(salt.as_bytes(), b"LED")?,
        })
    }

    fn expand(&self, salt: &[u8], info: &[u8]) -> Result<DerivedKey> {
        let hk = Hkdf::<Sha256>::new(Some(salt), self.root.as_bytes());
        let mut okm = [0u8; KEY_LEN];
        hk.expand(info, &mut okm)
            .map_err(|e| CoreError::KeyDerivation(format!("hkdf expand failed: {e}")))?;
        Ok(DerivedKey(okm))
    }
}
