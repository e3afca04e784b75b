//! Output layout: the name of every file a run produces.
//!
//! All names are relative to the output root, and the relative names are
//! what capsules and Merkle files record.
//!
//! ```text
//! $OUTDIR/
//!   cas/{sha}.bin
//!   {mesh}_seg_{n}_exec.json  {mesh}_seg_{n}_sla.json  {mesh}_seg_{n}_merkle.json
//!   {mesh}_chain_state.json   {mesh}_super_merkle.json  {mesh}_ledger_attest.sig.jsonl
//!   {capsule_id}.json  {capsule_id}.sig.json
//!   ledger_main.jsonl  intermesh.dot
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use meshledger_core::CapsuleId;

use crate::error::{Result, StoreError};

/// Name of the CAS directory.
pub const CAS_DIR: &str = "cas";

/// Default ledger file name.
pub const DEFAULT_LEDGER: &str = "ledger_main.jsonl";

/// Name of the intermesh ring graph.
pub const INTERMESH_DOT: &str = "intermesh.dot";

/// Resolves artifact names under an output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and CAS directories.
    pub fn ensure(&self) -> Result<()> {
        let cas = self.cas_dir();
        fs::create_dir_all(&cas).map_err(StoreError::io(&cas))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cas_dir(&self) -> PathBuf {
        self.root.join(CAS_DIR)
    }

    /// Absolute path of a relative artifact name.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// `{mesh}_{suffix}`
    pub fn mesh_file(mesh: &str, suffix: &str) -> String {
        format!("{mesh}_{suffix}")
    }

    pub fn seg_exec(mesh: &str, seg: u32) -> String {
        format!("{mesh}_seg_{seg}_exec.json")
    }

    pub fn seg_sla(mesh: &str, seg: u32) -> String {
        format!("{mesh}_seg_{seg}_sla.json")
    }

    pub fn seg_merkle(mesh: &str, seg: u32) -> String {
        format!("{mesh}_seg_{seg}_merkle.json")
    }

    pub fn super_merkle(mesh: &str) -> String {
        Self::mesh_file(mesh, "super_merkle.json")
    }

    pub fn chain_state(mesh: &str) -> String {
        Self::mesh_file(mesh, "chain_state.json")
    }

    /// Attestation file for a mesh's ledger lines.
    pub fn attest(mesh: &str) -> String {
        Self::mesh_file(mesh, "ledger_attest.sig.jsonl")
    }

    pub fn capsule(id: &CapsuleId) -> String {
        format!("{id}.json")
    }

    pub fn sidecar(id: &CapsuleId) -> String {
        format!("{id}.sig.json")
    }

    /// Every `{mesh}_seg_{n}_merkle.json` under the root, in lexicographic
    /// name order.
    pub fn segment_merkle_files(&self, mesh: &str) -> Result<Vec<String>> {
        let prefix = format!("{mesh}_seg_");
        let entries = fs::read_dir(&self.root).map_err(StoreError::io(&self.root))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io(&self.root))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_match = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix("_merkle.json"))
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
            if is_match {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(OutputLayout::seg_exec("drip", 2), "drip_seg_2_exec.json");
        assert_eq!(OutputLayout::seg_sla("drip", 2), "drip_seg_2_sla.json");
        assert_eq!(OutputLayout::seg_merkle("drip", 2), "drip_seg_2_merkle.json");
        assert_eq!(OutputLayout::attest("pulse"), "pulse_ledger_attest.sig.jsonl");
        let id = CapsuleId::hyper("IMESH", "00c0ffee");
        assert_eq!(OutputLayout::capsule(&id), "IMESH-HYPERMETA-00c0ffee.json");
        assert_eq!(OutputLayout::sidecar(&id), "IMESH-HYPERMETA-00c0ffee.sig.json");
    }

    #[test]
    fn test_segment_merkle_files_sorted_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.ensure().unwrap();
        for name in [
            "drip_seg_2_merkle.json",
            "drip_seg_10_merkle.json",
            "drip_seg_1_merkle.json",
            "drip_seg_1_exec.json",
            "drip_seg_x_merkle.json",
            "drip_seg_seg_1_merkle.json",
            "pulse_seg_1_merkle.json",
        ] {
            fs::write(layout.path(name), b"{}").unwrap();
        }

        assert_eq!(
            layout.segment_merkle_files("drip").unwrap(),
            vec![
                "drip_seg_10_merkle.json",
                "drip_seg_1_merkle.json",
                "drip_seg_2_merkle.json",
            ]
        );
    }
}
