//! A whole run: every mesh, then the hyper roll-up.

use std::collections::BTreeMap;
use std::thread;

use serde::Serialize;
use tracing::{info, warn};

use meshledger_core::MeshDef;

use crate::config::{Config, HYPER_MESH};
use crate::context::RunContext;
use crate::error::{LedgerError, Result};
use crate::executor::{rand8, seeded_rng, MeshExecutor, MeshReport};
use crate::monetize::{Totals, TotalsSummary};
use crate::rollup::{write_hyper, HyperSummary, SuperSummary};

/// Per-mesh line of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    pub name: String,
    pub segments: usize,
    pub ok_segments: u32,
    pub power_index: f64,
    pub last_chain: String,
}

/// A mesh that did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshFailure {
    pub mesh: String,
    pub kind: String,
    pub error: String,
}

/// The JSON printed on stdout when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub ok: bool,
    pub meshes: Vec<MeshSummary>,
    /// Super root per mesh.
    pub supers: BTreeMap<String, String>,
    pub hyper: Option<HyperSummary>,
    pub ledger: String,
    pub dots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<TotalsSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<MeshFailure>,
}

/// Outcome of one mesh before it is folded into the summary.
enum MeshResult {
    Done(MeshReport),
    Skipped(MeshFailure),
}

fn execute_mesh(ctx: &RunContext, mesh: &MeshDef) -> Result<MeshResult> {
    let executor = match MeshExecutor::new(ctx, mesh) {
        Ok(executor) => executor,
        Err(e @ LedgerError::Planner(_)) => {
            warn!(mesh = %mesh.name, error = %e, "mesh skipped");
            return Ok(MeshResult::Skipped(MeshFailure {
                mesh: mesh.name.clone(),
                kind: e.kind().to_string(),
                error: e.to_string(),
            }));
        }
        Err(e) => return Err(e),
    };
    executor.run().map(MeshResult::Done)
}

fn execute_all(ctx: &RunContext) -> Result<Vec<MeshResult>> {
    if !ctx.config.parallel {
        return ctx
            .config
            .meshes
            .iter()
            .map(|mesh| execute_mesh(ctx, mesh))
            .collect();
    }

    thread::scope(|scope| {
        let handles: Vec<_> = ctx
            .config
            .meshes
            .iter()
            .map(|mesh| (mesh, scope.spawn(move || execute_mesh(ctx, mesh))))
            .collect();
        handles
            .into_iter()
            .map(|(mesh, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Ok(MeshResult::Skipped(MeshFailure {
                        mesh: mesh.name.clone(),
                        kind: "Panic".into(),
                        error: "mesh thread panicked".into(),
                    }))
                })
            })
            .collect()
    })
}

/// Run every configured mesh and roll up the results.
///
/// Only configuration and key derivation failures are returned as errors.
/// A mesh that cannot be planned or that halts is listed under `failed` and
/// left out of the hyper capsule.
pub fn run(config: Config) -> Result<RunSummary> {
    let ctx = RunContext::open(config)?;
    let results = execute_all(&ctx)?;

    let mut meshes = Vec::new();
    let mut supers: Vec<SuperSummary> = Vec::new();
    let mut dots = Vec::new();
    let mut failed = Vec::new();
    let mut totals = Totals::default();

    for result in results {
        let report = match result {
            MeshResult::Done(report) => report,
            MeshResult::Skipped(failure) => {
                failed.push(failure);
                continue;
            }
        };
        meshes.push(MeshSummary {
            name: report.mesh.clone(),
            segments: report.state.len(),
            ok_segments: report.ok_segments,
            power_index: report.power_index,
            last_chain: report.state.last.clone(),
        });
        totals.add(report.totals);
        dots.extend(report.dot);
        if let Some(reason) = report.halted {
            failed.push(MeshFailure {
                mesh: report.mesh,
                kind: "IOError".into(),
                error: reason,
            });
        }
        supers.extend(report.super_capsule);
    }

    let hyper = if supers.is_empty() {
        warn!("no mesh finished, hyper roll-up skipped");
        None
    } else {
        let suffix = rand8(&mut seeded_rng(&ctx.config.rng_seed, HYPER_MESH));
        match write_hyper(&ctx, &supers, &suffix) {
            Ok(hyper) => Some(hyper),
            Err(e @ LedgerError::KeyDerivation(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "hyper roll-up failed");
                failed.push(MeshFailure {
                    mesh: HYPER_MESH.to_string(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    };
    if let Some(hyper) = &hyper {
        dots.push(hyper.dot.clone());
    }

    let summary = RunSummary {
        ok: failed.is_empty() && hyper.is_some(),
        meshes,
        supers: supers
            .into_iter()
            .map(|s| (s.mesh, s.super_root))
            .collect(),
        hyper,
        ledger: ctx.config.ledger_name.clone(),
        dots,
        totals: ctx.config.monetize.then(|| totals.summary()),
        failed,
    };
    info!(ok = summary.ok, meshes = summary.meshes.len(), failed = summary.failed.len(), "run complete");
    Ok(summary)
}
