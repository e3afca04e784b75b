//! Super (per mesh) and hyper (per run) roll-ups.
//!
//! A super capsule commits to every segment Merkle file of its mesh, in
//! lexicographic name order, followed by every segment capsule body in
//! chain order. The hyper capsule commits to the super roots:
//! `hyper_merkle = merkle([SHA256(super_root_i)])` in declared mesh order,
//! hashing each root's hex string.

use serde::Serialize;
use tracing::info;

use meshledger_core::{
    merkle_root, Capsule, CapsuleId, ChainState, HyperMeshEntry, HyperPayload, HyperProvenance,
    Sha256Hash, SuperPayload, SuperProvenance,
};
use meshledger_store::artifacts::{write_bytes, write_canonical};
use meshledger_store::layout::INTERMESH_DOT;
use meshledger_store::{ContentStore, LedgerEntry, LedgerEvent, OutputLayout, StoreError};

use crate::config::HYPER_MESH;
use crate::context::RunContext;
use crate::error::Result;
use crate::graph::intermesh_dot;
use crate::records::MerkleFile;
use crate::signer::write_signed;

/// A written super capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuperSummary {
    pub mesh: String,
    pub capsule_id: CapsuleId,
    pub sha256: String,
    pub super_root: String,
    pub last_chain: String,
    pub segments: usize,
}

/// A written hyper capsule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HyperSummary {
    pub capsule_id: CapsuleId,
    pub sha256: String,
    pub hyper_merkle: String,
    pub count: usize,
    pub dot: String,
}

/// Leaves of the hyper tree: SHA-256 of each super root's hex string.
pub fn hyper_leaves<S: AsRef<str>>(super_roots: &[S]) -> Vec<Sha256Hash> {
    super_roots
        .iter()
        .map(|root| Sha256Hash::hash(root.as_ref().as_bytes()))
        .collect()
}

/// `merkle([SHA256(super_root_i)])` as hex.
pub fn hyper_merkle<S: AsRef<str>>(super_roots: &[S]) -> String {
    merkle_root(&hyper_leaves(super_roots)).to_hex()
}

/// Roll up a finished mesh.
pub fn write_super(
    ctx: &RunContext,
    mesh: &str,
    state: &ChainState,
    suffix: &str,
) -> Result<SuperSummary> {
    let layout = &ctx.layout;

    let mut files = layout.segment_merkle_files(mesh)?;
    files.extend(state.segments.iter().map(|link| OutputLayout::capsule(&link.cid)));
    let hashes = files
        .iter()
        .map(|file| ctx.cas.put_file(&layout.path(file)))
        .collect::<std::result::Result<Vec<_>, StoreError>>()?;
    let root = merkle_root(&hashes).to_hex();

    let merkle_name = OutputLayout::super_merkle(mesh);
    write_canonical(
        &layout.path(&merkle_name),
        &MerkleFile {
            files,
            hashes: hashes.iter().map(Sha256Hash::to_hex).collect(),
            root: root.clone(),
        },
    )?;

    let capsule_id = CapsuleId::super_capsule(&ctx.config.prefix, mesh, suffix);
    let capsule = Capsule {
        capsule_id: capsule_id.clone(),
        ts: ctx.now(),
        provenance: SuperProvenance {
            super_merkle: root.clone(),
            chain_root: state.last.clone(),
        },
        payload: SuperPayload {
            segments: state.capsule_ids(),
            count: state.len(),
            merkle: merkle_name,
        },
    };

    let key = ctx.keyring.meta(mesh)?;
    let written = write_signed(ctx, &capsule, &key)?;

    let entry = LedgerEntry::new(mesh, LedgerEvent::Super, capsule_id.clone(), &written.sha256)
        .with("count", state.len())
        .with("super_merkle", root.clone());
    ctx.append_ledger(entry, &OutputLayout::attest(mesh), &key)?;

    info!(mesh, capsule = %capsule_id, super_merkle = %root, count = state.len(), "super capsule sealed");
    Ok(SuperSummary {
        mesh: mesh.to_string(),
        capsule_id,
        sha256: written.sha256,
        super_root: root,
        last_chain: state.last.clone(),
        segments: state.len(),
    })
}

/// Roll up every mesh's super capsule, in the given order.
pub fn write_hyper(ctx: &RunContext, supers: &[SuperSummary], suffix: &str) -> Result<HyperSummary> {
    let roots: Vec<&str> = supers.iter().map(|s| s.super_root.as_str()).collect();
    let merkle = hyper_merkle(&roots);

    let capsule_id = CapsuleId::hyper(&ctx.config.prefix, suffix);
    let capsule = Capsule {
        capsule_id: capsule_id.clone(),
        ts: ctx.now(),
        provenance: HyperProvenance {
            hyper_merkle: merkle.clone(),
            rings: supers.iter().map(|s| s.last_chain.clone()).collect(),
        },
        payload: HyperPayload {
            meshes: supers
                .iter()
                .map(|s| HyperMeshEntry {
                    mesh: s.mesh.clone(),
                    capsule_id: s.capsule_id.clone(),
                    super_root: s.super_root.clone(),
                    last_chain: s.last_chain.clone(),
                    segments: s.segments,
                })
                .collect(),
            count: supers.len(),
        },
    };

    let key = ctx.keyring.hyper()?;
    let written = write_signed(ctx, &capsule, &key)?;

    let entry = LedgerEntry::new(HYPER_MESH, LedgerEvent::Hyper, capsule_id.clone(), &written.sha256)
        .with("count", supers.len())
        .with("hyper_merkle", merkle.clone());
    ctx.append_ledger(entry, &OutputLayout::attest(HYPER_MESH), &key)?;

    let rings: Vec<(String, String)> = supers
        .iter()
        .map(|s| (s.mesh.clone(), s.last_chain.clone()))
        .collect();
    write_bytes(&ctx.layout.path(INTERMESH_DOT), intermesh_dot(&rings).as_bytes())?;

    info!(capsule = %capsule_id, hyper_merkle = %merkle, count = supers.len(), "hyper capsule sealed");
    Ok(HyperSummary {
        capsule_id,
        sha256: written.sha256,
        hyper_merkle: merkle,
        count: supers.len(),
        dot: INTERMESH_DOT.to_string(),
    })
}
