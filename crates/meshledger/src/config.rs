//! Run configuration.
//!
//! Every knob maps to an environment variable through clap's `env` feature,
//! so `SEG=2 CPS=1 meshledger` and `meshledger run --seg 2 --cps 1` are the
//! same run. [`RunArgs::into_config`] validates and clamps; nothing touches
//! the filesystem before it succeeds.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};

use meshledger_core::{builtin_mesh, MeshDef, BUILTIN_MESHES};
use meshledger_store::layout::DEFAULT_LEDGER;

use crate::error::{LedgerError, Result};

/// Lower bound for `SEG` and `CPS`.
pub const MIN_COUNT: u32 = 1;
/// Upper bound for `SEG` and `CPS`.
pub const MAX_COUNT: u32 = 100;

/// Mesh name reserved for the hyper roll-up's ledger lines.
pub const HYPER_MESH: &str = "hypermeta";

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Source of `ts` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Wall clock, one-second resolution.
    System,
    /// The same instant for every artifact.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// A clock pinned to a Unix timestamp.
    pub fn fixed(epoch: i64) -> Result<Self> {
        DateTime::<Utc>::from_timestamp(epoch, 0)
            .map(Clock::Fixed)
            .ok_or_else(|| LedgerError::config(format!("EPOCH {epoch} is out of range")))
    }

    /// Current time as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn now(&self) -> String {
        let instant = match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        };
        instant.format(TS_FORMAT).to_string()
    }
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output root.
    pub outdir: PathBuf,
    /// Segments per mesh.
    pub segments: u32,
    /// Cycles per segment.
    pub cycles: u32,
    /// Segment p95 threshold in milliseconds.
    pub slo_ms: u32,
    /// Running spend ceiling.
    pub budget: f64,
    /// Power-index exponent.
    pub pow: i32,
    /// Folded into segment key labels.
    pub seed: String,
    /// Raw `MESH_SECRET`; empty means a fresh random secret.
    pub secret: String,
    /// Meshes in declared (and hyper) order.
    pub meshes: Vec<MeshDef>,
    /// Capsule id prefix.
    pub prefix: String,
    /// Seeds the simulation PRNG.
    pub rng_seed: String,
    pub clock: Clock,
    /// Ledger file name under `outdir`.
    pub ledger_name: String,
    pub monetize: bool,
    /// Run meshes on scoped threads.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("./ledger"),
            segments: 20,
            cycles: 12,
            slo_ms: 300,
            budget: 5000.0,
            pow: 12,
            seed: "TrueNorth".to_string(),
            secret: String::new(),
            meshes: BUILTIN_MESHES.iter().filter_map(|m| builtin_mesh(m)).collect(),
            prefix: "IMESH".to_string(),
            rng_seed: "TrueNorth".to_string(),
            clock: Clock::System,
            ledger_name: DEFAULT_LEDGER.to_string(),
            monetize: true,
            parallel: false,
        }
    }
}

impl Config {
    /// Clamp a requested count into `1..=100`.
    pub fn clamp_count(n: i64) -> u32 {
        n.clamp(MIN_COUNT as i64, MAX_COUNT as i64) as u32
    }

    /// Check everything that can be checked without I/O.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty()
            || !self
                .prefix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(LedgerError::config(format!(
                "PREFIX {:?} must match [A-Z0-9_]+",
                self.prefix
            )));
        }
        if self.ledger_name.is_empty()
            || self.ledger_name.contains(['/', '\\'])
            || self.ledger_name.starts_with('.')
        {
            return Err(LedgerError::config(format!(
                "LEDGER_NAME {:?} must be a plain file name",
                self.ledger_name
            )));
        }
        if !(MIN_COUNT..=MAX_COUNT).contains(&self.segments)
            || !(MIN_COUNT..=MAX_COUNT).contains(&self.cycles)
        {
            return Err(LedgerError::config("SEG and CPS must be within 1..=100"));
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(LedgerError::config("BUD must be a non-negative number"));
        }
        if self.meshes.is_empty() {
            return Err(LedgerError::config("no meshes configured"));
        }

        let mut seen = std::collections::HashSet::new();
        for mesh in &self.meshes {
            mesh.validate_name()
                .map_err(|e| LedgerError::config(e.to_string()))?;
            if mesh.name == HYPER_MESH {
                return Err(LedgerError::config(format!(
                    "mesh name {HYPER_MESH:?} is reserved"
                )));
            }
            if !seen.insert(mesh.name.as_str()) {
                return Err(LedgerError::config(format!(
                    "mesh {:?} is declared twice",
                    mesh.name
                )));
            }
        }
        Ok(())
    }

    /// Look up mesh definitions by name.
    pub fn builtin_meshes(names: &str) -> Result<Vec<MeshDef>> {
        names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|name| {
                builtin_mesh(name).ok_or_else(|| {
                    LedgerError::config(format!(
                        "unknown mesh {name:?} (known: {})",
                        BUILTIN_MESHES.join(", ")
                    ))
                })
            })
            .collect()
    }

    /// Read mesh definitions from a JSON array.
    pub fn load_mesh_file(path: &Path) -> Result<Vec<MeshDef>> {
        let text = fs::read_to_string(path)
            .map_err(|e| LedgerError::config(format!("MESH_FILE {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| LedgerError::config(format!("MESH_FILE {}: {e}", path.display())))
    }
}

/// Flags and environment variables for a run.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Output root for ledger, CAS, capsules and graphs
    #[arg(long, env = "OUTDIR", default_value = "./ledger")]
    pub outdir: PathBuf,

    /// Segments per mesh (clamped to 1..=100)
    #[arg(long, env = "SEG", default_value_t = 20, allow_negative_numbers = true)]
    pub seg: i64,

    /// Cycles per segment (clamped to 1..=100)
    #[arg(long, env = "CPS", default_value_t = 12, allow_negative_numbers = true)]
    pub cps: i64,

    /// Segment p95 threshold in milliseconds
    #[arg(long, env = "SLO", default_value_t = 300)]
    pub slo: u32,

    /// Running spend ceiling
    #[arg(long, env = "BUD", default_value_t = 5000.0)]
    pub bud: f64,

    /// Power-index exponent
    #[arg(long, env = "POW", default_value_t = 12, allow_negative_numbers = true)]
    pub pow: i32,

    /// Seed folded into key derivation labels
    #[arg(long, env = "SEED", default_value = "TrueNorth")]
    pub seed: String,

    /// Root secret: hex or any string; random when unset
    #[arg(long, env = "MESH_SECRET", default_value = "", hide_env_values = true, hide_default_value = true)]
    pub secret: String,

    /// Comma-separated built-in meshes
    #[arg(long, env = "MESHES", default_value = "drip,pulse,weave")]
    pub meshes: String,

    /// JSON file of mesh definitions (overrides MESHES)
    #[arg(long, env = "MESH_FILE")]
    pub mesh_file: Option<PathBuf>,

    /// Capsule id prefix
    #[arg(long, env = "PREFIX", default_value = "IMESH")]
    pub prefix: String,

    /// Simulation PRNG seed (defaults to SEED)
    #[arg(long, env = "RNG_SEED")]
    pub rng_seed: Option<String>,

    /// Fixed Unix timestamp for every ts field
    #[arg(long, env = "EPOCH", allow_negative_numbers = true)]
    pub epoch: Option<i64>,

    /// Ledger file name
    #[arg(long, env = "LEDGER_NAME", default_value = DEFAULT_LEDGER)]
    pub ledger_name: String,

    /// Simulate monetization
    #[arg(long, env = "MONETIZE", default_value = "1", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub monetize: bool,

    /// Run meshes on threads
    #[arg(long, env = "PARALLEL", default_value = "0", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub parallel: bool,
}

impl RunArgs {
    /// Resolve into a validated [`Config`].
    pub fn into_config(self) -> Result<Config> {
        let meshes = match &self.mesh_file {
            Some(path) => Config::load_mesh_file(path)?,
            None => Config::builtin_meshes(&self.meshes)?,
        };
        let clock = match self.epoch {
            Some(epoch) => Clock::fixed(epoch)?,
            None => Clock::System,
        };

        let config = Config {
            outdir: self.outdir,
            segments: Config::clamp_count(self.seg),
            cycles: Config::clamp_count(self.cps),
            slo_ms: self.slo,
            budget: self.bud,
            pow: self.pow,
            rng_seed: self.rng_seed.unwrap_or_else(|| self.seed.clone()),
            seed: self.seed,
            secret: self.secret,
            meshes,
            prefix: self.prefix,
            clock,
            ledger_name: self.ledger_name,
            monetize: self.monetize,
            parallel: self.parallel,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["meshledger"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().run.into_config()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.segments, 20);
        assert_eq!(config.cycles, 12);
        assert_eq!(config.slo_ms, 300);
        assert_eq!(config.pow, 12);
        assert_eq!(config.seed, "TrueNorth");
        let names: Vec<_> = config.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["drip", "pulse", "weave"]);
        config.validate().unwrap();
    }

    #[test]
    fn test_counts_are_clamped() {
        let config = parse(&["--seg", "0", "--cps", "1000"]).unwrap();
        assert_eq!(config.segments, 1);
        assert_eq!(config.cycles, 100);
        assert_eq!(Config::clamp_count(-5), 1);
    }

    #[test]
    fn test_rng_seed_defaults_to_seed() {
        let config = parse(&["--seed", "tn"]).unwrap();
        assert_eq!(config.rng_seed, "tn");
        let config = parse(&["--seed", "tn", "--rng-seed", "other"]).unwrap();
        assert_eq!(config.rng_seed, "other");
    }

    #[test]
    fn test_unknown_mesh_is_config_error() {
        let err = parse(&["--meshes", "drip,nope"]).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_bad_prefix_is_config_error() {
        assert!(matches!(parse(&["--prefix", "im-esh"]), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_boolish_flags() {
        let config = parse(&["--monetize", "0", "--parallel", "yes"]).unwrap();
        assert!(!config.monetize);
        assert!(config.parallel);
    }

    #[test]
    fn test_reserved_and_duplicate_meshes_rejected() {
        let mut config = Config::default();
        config.meshes.push(MeshDef::single(HYPER_MESH, "x"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.meshes.push(MeshDef::single("drip", "x"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_clock_format() {
        let clock = Clock::fixed(1_768_392_000).unwrap();
        assert_eq!(clock.now(), "2026-01-14T12:00:00Z");
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_mesh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meshes.json");
        fs::write(&path, r#"[{"name":"solo","verb":"act"}]"#).unwrap();
        let config = parse(&["--mesh-file", path.to_str().unwrap()]).unwrap();
        assert_eq!(config.meshes.len(), 1);
        assert_eq!(config.meshes[0].verb, "act");
    }
}
