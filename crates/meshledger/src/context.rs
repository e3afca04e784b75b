//! The run context: configuration, keys and shared sinks for one run.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::info;

use meshledger_core::{DerivedKey, Keyring, RootSecret};
use meshledger_store::{FsCas, LedgerEntry, LedgerRecord, LedgerWriter, OutputLayout, StoreError};

use crate::config::Config;
use crate::error::{LedgerError, Result};

/// Everything a component needs, passed explicitly.
///
/// The ledger writer is the only shared mutable sink and sits behind a
/// mutex so meshes may run on separate threads.
pub struct RunContext {
    pub config: Config,
    pub layout: OutputLayout,
    pub keyring: Keyring,
    pub cas: FsCas,
    org: DerivedKey,
    ledger: Mutex<LedgerWriter>,
}

impl RunContext {
    /// Derive the run-wide keys, then create the output root.
    ///
    /// Key derivation runs first so a failure leaves nothing on disk. An
    /// output root that already holds the ledger, or a chain state for one of
    /// the configured meshes, is refused.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let keyring = Keyring::new(RootSecret::parse(&config.secret), config.seed.clone());
        let org = keyring.org()?;
        keyring.hyper()?;
        for mesh in &config.meshes {
            keyring.meta(&mesh.name)?;
        }

        let layout = OutputLayout::new(&config.outdir);
        refuse_previous_run(&layout, &config)?;
        layout.ensure()?;
        let cas = FsCas::open(layout.cas_dir())?;
        let ledger = LedgerWriter::open(layout.path(&config.ledger_name))?;

        info!(
            outdir = %layout.root().display(),
            meshes = config.meshes.len(),
            segments = config.segments,
            cycles = config.cycles,
            org_hint = %org.hint(),
            "run context ready"
        );

        Ok(Self {
            config,
            layout,
            keyring,
            cas,
            org,
            ledger: Mutex::new(ledger),
        })
    }

    /// Timestamp for a new artifact.
    pub fn now(&self) -> String {
        self.config.clock.now()
    }

    /// The org key, co-signing every artifact.
    pub fn org_key(&self) -> &DerivedKey {
        &self.org
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.layout.path(&self.config.ledger_name)
    }

    /// Append a ledger line and its attestation under the ledger lock.
    pub fn append_ledger(
        &self,
        entry: LedgerEntry,
        attest_name: &str,
        key: &DerivedKey,
    ) -> Result<LedgerRecord> {
        let ts = self.now();
        let attest_path = self.layout.path(attest_name);
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(ledger.append(&ts, entry, &attest_path, &[key, &self.org])?)
    }
}

fn refuse_previous_run(layout: &OutputLayout, config: &Config) -> Result<()> {
    let ledger = layout.path(&config.ledger_name);
    if fs::metadata(&ledger).is_ok_and(|m| m.len() > 0) {
        return Err(LedgerError::config(format!(
            "{} already holds a ledger; use a fresh OUTDIR",
            ledger.display()
        )));
    }
    for mesh in &config.meshes {
        let state = layout.path(&OutputLayout::chain_state(&mesh.name));
        if state.exists() {
            return Err(LedgerError::config(format!(
                "{} is left from an earlier run; use a fresh OUTDIR",
                state.display()
            )));
        }
    }
    Ok(())
}
