//! Binary Merkle roots over SHA-256 leaves.
//!
//! Leaves are paired left to right over their raw 32-byte values. An odd
//! trailing leaf is paired with itself. A single leaf is its own root, and
//! an empty list hashes the empty byte string.

use crate::crypto::Sha256Hash;
use crate::error::Result;

/// Compute the Merkle root of an ordered list of leaves.
pub fn merkle_root(leaves: &[Sha256Hash]) -> Sha256Hash {
    if leaves.is_empty() {
        return Sha256Hash::hash(&[]);
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                Sha256Hash::hash_pair(left, right)
            })
            .collect();
    }
    level[0]
}

/// Merkle root of hex-encoded leaves, returned as hex.
pub fn merkle_root_hex<S: AsRef<str>>(leaves: &[S]) -> Result<String> {
    let parsed = leaves
        .iter()
        .map(|leaf| Sha256Hash::from_hex(leaf.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(merkle_root(&parsed).to_hex())
}
