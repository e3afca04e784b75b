//! Strong type definitions for the mesh ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Sentinel used where a chain has no predecessor.
pub const GENESIS: &str = "genesis";

/// Tag in hyper capsule ids.
pub const HYPER_TAG: &str = "HYPERMETA";

/// Tag in super capsule ids.
pub const SUPER_TAG: &str = "SUPER";

/// What a capsule commits to, recovered from its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapsuleKind {
    /// One segment of a mesh (1-indexed).
    Segment(u32),
    /// A mesh roll-up.
    Super,
    /// The run roll-up.
    Hyper,
}

/// A capsule identifier.
///
/// - segment: `{PREFIX}-{MESH}-SEG{n}-{rand8}`
/// - super: `{PREFIX}-{MESH}-SUPER-{rand8}`
/// - hyper: `{PREFIX}-HYPERMETA-{rand8}`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapsuleId(String);

impl CapsuleId {
    /// Id for segment `seg` of `mesh`.
    pub fn segment(prefix: &str, mesh: &str, seg: u32, suffix: &str) -> Self {
        Self(format!(
            "{prefix}-{}-SEG{seg}-{suffix}",
            mesh.to_ascii_uppercase()
        ))
    }

    /// Id for the super capsule of `mesh`.
    pub fn super_capsule(prefix: &str, mesh: &str, suffix: &str) -> Self {
        Self(format!(
            "{prefix}-{}-{SUPER_TAG}-{suffix}",
            mesh.to_ascii_uppercase()
        ))
    }

    /// Id for the hyper capsule.
    pub fn hyper(prefix: &str, suffix: &str) -> Self {
        Self(format!("{prefix}-{HYPER_TAG}-{suffix}"))
    }

    /// Parse and check an id string.
    pub fn parse(s: &str) -> Result<Self> {
        let id = Self(s.to_string());
        id.kind()?;
        Ok(id)
    }

    /// Get the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the capsule kind from the id.
    pub fn kind(&self) -> Result<CapsuleKind> {
        let parts: Vec<&str> = self.0.split('-').collect();
        let malformed = || CoreError::MalformedCapsuleId(self.0.clone());

        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(malformed());
        }
        let suffix = parts[parts.len() - 1];
        if suffix.len() != 8 || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }

        let tag = parts[parts.len() - 2];
        if tag == HYPER_TAG {
            return Ok(CapsuleKind::Hyper);
        }
        if parts.len() < 4 {
            return Err(malformed());
        }
        if tag == SUPER_TAG {
            return Ok(CapsuleKind::Super);
        }
        tag.strip_prefix("SEG")
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(CapsuleKind::Segment)
            .ok_or_else(malformed)
    }

    /// The lower-cased mesh name, for segment and super capsules.
    pub fn mesh(&self) -> Option<String> {
        match self.kind().ok()? {
            CapsuleKind::Hyper => None,
            _ => {
                let parts: Vec<&str> = self.0.split('-').collect();
                Some(parts[parts.len() - 3].to_ascii_lowercase())
            }
        }
    }
}

impl fmt::Debug for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapsuleId({})", self.0)
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CapsuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
