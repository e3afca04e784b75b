//! Writing signed capsules.

use serde::Serialize;
use tracing::debug;

use meshledger_core::{Capsule, CapsuleId, DerivedKey, SignatureSidecar};
use meshledger_store::artifacts::{write_bytes, write_canonical};
use meshledger_store::OutputLayout;

use crate::context::RunContext;
use crate::error::Result;

/// A capsule on disk.
#[derive(Debug, Clone)]
pub struct WrittenCapsule {
    pub id: CapsuleId,
    /// SHA-256 of `{id}.json`.
    pub sha256: String,
    pub sidecar: SignatureSidecar,
}

/// Write `{id}.json` and `{id}.sig.json`.
///
/// The body is encoded once; the written bytes are the hashed bytes. The
/// sidecar carries one MAC under `key` and one under the org key.
pub fn write_signed<P: Serialize, Q: Serialize>(
    ctx: &RunContext,
    capsule: &Capsule<P, Q>,
    key: &DerivedKey,
) -> Result<WrittenCapsule> {
    let sealed = capsule.seal()?;
    write_bytes(
        &ctx.layout.path(&OutputLayout::capsule(&sealed.id)),
        &sealed.bytes,
    )?;

    let sidecar = sealed.sign(&capsule.ts, &[key, ctx.org_key()])?;
    write_canonical(&ctx.layout.path(&OutputLayout::sidecar(&sealed.id)), &sidecar)?;

    debug!(capsule = %sealed.id, sha256 = %sealed.sha256, "capsule signed");
    Ok(WrittenCapsule {
        id: sealed.id,
        sha256: sealed.sha256.to_hex(),
        sidecar,
    })
}
