//! # Mesh Ledger Core
//!
//! Pure primitives for the mesh ledger: hashing, key derivation, canonical
//! JSON, Merkle roots, mesh planning, and capsule bodies.
//!
//! This crate contains no I/O. Everything here is deterministic computation
//! over bytes, which is what makes a ledger reproducible.
//!
//! ## Key Types
//!
//! - [`Sha256Hash`] - A SHA-256 digest, rendered as lowercase hex everywhere
//! - [`Keyring`] - HKDF key derivation from the run's root secret
//! - [`Capsule`] - A signed unit of work, generic over provenance and payload
//! - [`ChainState`] - The rolling per-mesh chain digest (`STATE.last`)
//! - [`MeshDef`] - A named DAG of capabilities with a root verb
//!
//! ## Canonicalization
//!
//! Every hashed object is encoded as compact JSON with field insertion order
//! preserved. See the [`canonical`] module.

pub mod canonical;
pub mod capsule;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod mesh;
pub mod planner;
pub mod types;
pub mod validation;

pub use canonical::{canonical_digest, from_canonical, recanonicalize, to_canonical_bytes};
pub use capsule::{
    AnyCapsule, Capsule, HyperCapsule, HyperMeshEntry, HyperPayload, HyperProvenance, SealedCapsule,
    SegmentCapsule, SegmentPayload, SegmentProvenance, SignatureSidecar, SuperCapsule,
    SuperPayload, SuperProvenance,
};
pub use chain::{chain_step, ChainLink, ChainState};
pub use crypto::{
    attest, hmac_sha256, key_hint, sha256_hex, DerivedKey, Keyring, RootSecret, SegmentKeys,
    Sha256Hash,
};
pub use error::{CoreError, PlannerError, Result};
pub use merkle::{merkle_root, merkle_root_hex};
pub use mesh::{builtin_mesh, Grant, MeshDef, BUILTIN_MESHES};
pub use planner::plan;
pub use types::{CapsuleId, CapsuleKind, GENESIS};
pub use validation::{validate_capsule_id, validate_hex_digest, validate_sidecar, MIN_MACS};
