//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use meshledger_core::{CapsuleId, MeshDef, Sha256Hash};

/// Generate a random digest.
pub fn digest() -> impl Strategy<Value = Sha256Hash> {
    any::<[u8; 32]>().prop_map(Sha256Hash::from_bytes)
}

/// Generate a list of Merkle leaves.
pub fn leaves(max_len: usize) -> impl Strategy<Value = Vec<Sha256Hash>> {
    prop::collection::vec(digest(), 0..=max_len)
}

/// Generate a valid mesh name.
pub fn mesh_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_filter("reserved", |name| name != "hypermeta")
}

/// Generate a capsule id suffix.
pub fn suffix() -> impl Strategy<Value = String> {
    any::<u32>().prop_map(|n| format!("{n:08x}"))
}

/// Generate a segment capsule id.
pub fn segment_id() -> impl Strategy<Value = CapsuleId> {
    (mesh_name(), 1u32..=100, suffix())
        .prop_map(|(mesh, seg, suffix)| CapsuleId::segment("IMESH", &mesh, seg, &suffix))
}

/// Generate an acyclic mesh.
///
/// Capabilities are `c0..cN` with `c0` as the verb; edges only point from a
/// lower index to a higher one.
pub fn acyclic_mesh() -> impl Strategy<Value = MeshDef> {
    (mesh_name(), 1usize..=8)
        .prop_flat_map(|(name, n)| {
            let edges = prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..=3), n);
            (Just(name), Just(n), edges)
        })
        .prop_map(|(name, n, raw)| {
            let mut edges = BTreeMap::new();
            for (from, targets) in raw.into_iter().enumerate() {
                if from + 1 >= n {
                    continue;
                }
                let mut to: Vec<String> = targets
                    .iter()
                    .map(|ix| format!("c{}", from + 1 + ix.index(n - from - 1)))
                    .collect();
                to.dedup();
                if !to.is_empty() {
                    edges.insert(format!("c{from}"), to);
                }
            }
            MeshDef {
                edges,
                ..MeshDef::single(&name, "c0")
            }
        })
}
