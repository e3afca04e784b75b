//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Every fixture pins the clock,
//! secret and seeds, so two fixtures with the same shape produce the same
//! bytes.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::TempDir;

use meshledger::config::{Clock, Config};
use meshledger::{RunSummary, Verifier};
use meshledger_core::{builtin_mesh, Keyring, MeshDef, RootSecret};
use meshledger_store::layout::DEFAULT_LEDGER;

/// 2026-01-14T12:00:00Z.
pub const FIXED_EPOCH: i64 = 1_768_392_000;
/// Root secret used by fixtures (hex).
pub const TEST_SECRET: &str = "deadbeef";
/// Key derivation and PRNG seed used by fixtures.
pub const TEST_SEED: &str = "tn";

/// A deterministic run configuration in its own temporary directory.
pub struct RunFixture {
    pub dir: TempDir,
    pub config: Config,
}

impl RunFixture {
    /// A run over the given meshes.
    pub fn new(meshes: Vec<MeshDef>, segments: u32, cycles: u32) -> Self {
        let dir = TempDir::new().expect("create tempdir");
        let config = Config {
            outdir: dir.path().join("out"),
            segments,
            cycles,
            seed: TEST_SEED.to_string(),
            secret: TEST_SECRET.to_string(),
            meshes,
            rng_seed: TEST_SEED.to_string(),
            clock: Clock::fixed(FIXED_EPOCH).expect("fixed epoch"),
            monetize: false,
            ..Config::default()
        };
        Self { dir, config }
    }

    /// One mesh with one capability.
    pub fn solo(segments: u32, cycles: u32) -> Self {
        Self::new(vec![MeshDef::single("solo", "solo")], segments, cycles)
    }

    /// Built-in meshes by name, in the given order.
    pub fn builtin(names: &[&str], segments: u32, cycles: u32) -> Self {
        let meshes = names
            .iter()
            .map(|name| builtin_mesh(name).expect("built-in mesh"))
            .collect();
        Self::new(meshes, segments, cycles)
    }

    /// Point the run at another directory under the same tempdir.
    pub fn with_outdir(mut self, name: &str) -> Self {
        self.config.outdir = self.dir.path().join(name);
        self
    }

    pub fn with_monetize(mut self, on: bool) -> Self {
        self.config.monetize = on;
        self
    }

    pub fn with_parallel(mut self, on: bool) -> Self {
        self.config.parallel = on;
        self
    }

    pub fn outdir(&self) -> &Path {
        &self.config.outdir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.config.outdir.join(name)
    }

    /// Execute the run.
    pub fn run(&self) -> meshledger::Result<RunSummary> {
        meshledger::run(self.config.clone())
    }

    /// The keyring the run signs with.
    pub fn keyring(&self) -> Keyring {
        Keyring::new(RootSecret::parse(TEST_SECRET), TEST_SEED)
    }

    /// A verifier over the output root, with or without keys.
    pub fn verifier(&self, keyed: bool) -> Verifier {
        if keyed {
            Verifier::with_keys(self.outdir(), self.keyring()).expect("derive org key")
        } else {
            Verifier::new(self.outdir())
        }
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        fs::read(self.path(name)).unwrap_or_else(|e| panic!("read {name}: {e}"))
    }

    pub fn read_json(&self, name: &str) -> Value {
        serde_json::from_slice(&self.read(name)).unwrap_or_else(|e| panic!("parse {name}: {e}"))
    }

    /// Parsed lines of the default ledger.
    pub fn ledger_lines(&self) -> Vec<Map<String, Value>> {
        let text = String::from_utf8(self.read(DEFAULT_LEDGER)).expect("utf-8 ledger");
        text.lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).expect("ledger line"))
            .collect()
    }

    /// Every file under the output root, relative and sorted.
    pub fn files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect(self.outdir(), self.outdir(), &mut out);
        out.sort();
        out
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_isolated() {
        let a = RunFixture::solo(1, 1);
        let b = RunFixture::solo(1, 1);
        assert_ne!(a.outdir(), b.outdir());
        assert_eq!(a.config.segments, 1);
        assert!(a.config.validate().is_ok());
    }

    #[test]
    fn test_builtin_order_is_kept() {
        let fixture = RunFixture::builtin(&["weave", "drip"], 1, 1);
        let names: Vec<_> = fixture.config.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["weave", "drip"]);
    }
}
