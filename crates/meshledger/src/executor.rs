//! Segment and cycle execution for one mesh.
//!
//! A [`MeshExecutor`] owns its mesh's [`ChainState`] and PRNG. Each segment
//! simulates its cycles, writes the exec, SLA and Merkle files, signs a
//! capsule chained to the previous one, appends a heartbeat and a ledger
//! line, then advances the chain. A failed write aborts the segment
//! before the chain moves and halts the mesh.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use meshledger_core::{
    chain_step, merkle_root, plan, sha256_hex, Capsule, CapsuleId, ChainState, MeshDef,
    SegmentPayload, SegmentProvenance, Sha256Hash,
};
use meshledger_store::artifacts::{append_canonical, write_bytes, write_canonical};
use meshledger_store::{ContentStore, LedgerEntry, LedgerEvent, OutputLayout};

use crate::context::RunContext;
use crate::descriptors::write_descriptors;
use crate::error::{LedgerError, Result};
use crate::graph;
use crate::monetize::{self, round4, Monetizer, Totals};
use crate::records::{
    Anomaly, CapabilityRun, CycleRecord, Heartbeat, MerkleFile, Radius, SegmentExec,
    SegmentLink, SegmentSla,
};
use crate::rollup::{write_super, SuperSummary};

/// Latency bounds in milliseconds, inclusive.
pub const LATENCY_MS: std::ops::RangeInclusive<u32> = 160..=340;

/// Probability of a `low` risk radius.
pub const P_LOW_RADIUS: f64 = 0.73;

/// Per-capability USD ceiling.
pub const USD_CEILING: f64 = 420.0;

/// pBFT phases folded into the rolling digest, in order.
pub const PBFT_PHASES: [&str; 3] = ["pp", "pr", "cm"];

/// USD for the capability at chain index `j`: `(0.03 + 0.02 j) * 100`.
pub fn capability_usd(j: usize) -> f64 {
    round4((0.03 + 0.02 * j as f64) * 100.0)
}

/// Inclusive 95th percentile: `sorted[ceil(0.95 n) - 1]`.
pub fn p95(latencies: &[u32]) -> u32 {
    if latencies.is_empty() {
        return 0;
    }
    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();
    let rank = (0.95 * sorted.len() as f64).ceil() as usize;
    sorted[rank.max(1) - 1]
}

/// Fold one capability step into the rolling pBFT digest.
pub fn pbft_step(state: &str, mesh: &str, seg: u32, cycle: u32, cap: &str) -> String {
    PBFT_PHASES.iter().fold(state.to_string(), |acc, phase| {
        sha256_hex(format!("{acc}{mesh}:{seg}:{cycle}:{cap}:{phase}").as_bytes())
    })
}

/// Seed a PRNG from `SHA256("{seed}:{label}")`.
pub fn seeded_rng(seed: &str, label: &str) -> ChaCha8Rng {
    ChaCha8Rng::from_seed(*Sha256Hash::hash(format!("{seed}:{label}").as_bytes()).as_bytes())
}

/// Eight hex digits for a capsule id suffix.
pub fn rand8(rng: &mut impl Rng) -> String {
    format!("{:08x}", rng.gen::<u32>())
}

/// A written segment.
#[derive(Debug, Clone)]
pub struct SegmentOutcome {
    pub seg: u32,
    pub capsule_id: CapsuleId,
    pub sha256: String,
    pub merkle_root: String,
    pub chain: String,
    pub ok: bool,
    pub p95_ms: u32,
}

/// What a mesh produced.
#[derive(Debug, Clone)]
pub struct MeshReport {
    pub mesh: String,
    pub state: ChainState,
    pub ok_segments: u32,
    pub power_index: f64,
    pub totals: Totals,
    /// Present unless the mesh halted.
    pub super_capsule: Option<SuperSummary>,
    /// Why the mesh halted.
    pub halted: Option<String>,
    pub dot: Option<String>,
}

/// Executes one mesh's segments in order.
pub struct MeshExecutor<'a> {
    ctx: &'a RunContext,
    mesh: &'a MeshDef,
    chain: Vec<String>,
    state: ChainState,
    rng: ChaCha8Rng,
    monetizer: Option<Box<dyn Monetizer>>,
    monetize_rng: ChaCha8Rng,
    spend: f64,
    totals: Totals,
    ok_segments: u32,
    anomalies: Vec<Anomaly>,
}

impl<'a> MeshExecutor<'a> {
    /// Plan the mesh. A planner error means the mesh cannot run.
    pub fn new(ctx: &'a RunContext, mesh: &'a MeshDef) -> Result<Self> {
        let chain = plan(mesh)?;
        let seed = &ctx.config.rng_seed;
        let monetizer = if ctx.config.monetize {
            monetize::for_mesh(mesh)
        } else {
            None
        };

        Ok(Self {
            ctx,
            mesh,
            chain,
            state: ChainState::new(&mesh.name),
            rng: seeded_rng(seed, &mesh.name),
            monetizer,
            monetize_rng: seeded_rng(seed, &format!("{}:monetize", mesh.name)),
            spend: 0.0,
            totals: Totals::default(),
            ok_segments: 0,
            anomalies: Vec::new(),
        })
    }

    /// The planned capability chain.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Run every segment, persist the mesh files and roll up.
    ///
    /// Only key derivation failures are returned as errors. Anything else
    /// halts the mesh and is reported in [`MeshReport::halted`].
    pub fn run(mut self) -> Result<MeshReport> {
        let name = self.mesh.name.clone();
        info!(mesh = %name, chain = ?self.chain, "mesh start");

        let halted = match self.run_inner() {
            Ok(()) => None,
            Err(e @ LedgerError::KeyDerivation(_)) => return Err(e),
            Err(e) => {
                warn!(mesh = %name, error = %e, segments = self.state.len(), "mesh halted");
                Some(e.to_string())
            }
        };

        // Whatever was written stays inspectable.
        let persisted = self.persist_state();
        let halted = match (halted, persisted) {
            (Some(h), _) => Some(h),
            (None, Err(e)) => Some(e.to_string()),
            (None, Ok(())) => None,
        };

        let super_capsule = match halted {
            Some(_) => None,
            None => {
                let suffix = rand8(&mut self.rng);
                match write_super(self.ctx, &name, &self.state, &suffix) {
                    Ok(summary) => Some(summary),
                    Err(e @ LedgerError::KeyDerivation(_)) => return Err(e),
                    Err(e) => {
                        warn!(mesh = %name, error = %e, "super roll-up failed");
                        return Ok(self.report(Some(e.to_string()), None));
                    }
                }
            }
        };

        Ok(self.report(halted, super_capsule))
    }

    fn report(self, halted: Option<String>, super_capsule: Option<SuperSummary>) -> MeshReport {
        let segments = self.ctx.config.segments.max(1);
        let ratio = f64::from(self.ok_segments) / f64::from(segments);
        let dot = OutputLayout::mesh_file(&self.mesh.name, "links.dot");
        let dot = self.ctx.layout.path(&dot).exists().then_some(dot);
        MeshReport {
            mesh: self.mesh.name.clone(),
            power_index: round4(ratio.powi(self.ctx.config.pow)),
            ok_segments: self.ok_segments,
            totals: self.totals,
            state: self.state,
            super_capsule,
            halted,
            dot,
        }
    }

    fn run_inner(&mut self) -> Result<()> {
        write_descriptors(&self.ctx.layout, self.mesh, &self.chain)?;
        for seg in 1..=self.ctx.config.segments {
            let outcome = self.run_segment(seg)?;
            info!(
                mesh = %self.mesh.name,
                seg,
                capsule = %outcome.capsule_id,
                ok = outcome.ok,
                p95_ms = outcome.p95_ms,
                "segment sealed"
            );
        }
        Ok(())
    }

    /// Simulate, write and sign segment `seg`.
    pub fn run_segment(&mut self, seg: u32) -> Result<SegmentOutcome> {
        let ctx = self.ctx;
        let mesh = self.mesh.name.clone();
        let layout = &ctx.layout;

        let (exec, sla) = self.simulate(seg);

        let exec_name = OutputLayout::seg_exec(&mesh, seg);
        let sla_name = OutputLayout::seg_sla(&mesh, seg);
        let merkle_name = OutputLayout::seg_merkle(&mesh, seg);

        let exec_bytes = write_canonical(&layout.path(&exec_name), &exec)?;
        let sla_bytes = write_canonical(&layout.path(&sla_name), &sla)?;
        let hashes = [
            ctx.cas.put_bytes(&exec_bytes)?,
            ctx.cas.put_bytes(&sla_bytes)?,
        ];
        let root = merkle_root(&hashes).to_hex();
        let merkle = MerkleFile {
            files: vec![exec_name.clone(), sla_name.clone()],
            hashes: hashes.iter().map(Sha256Hash::to_hex).collect(),
            root: root.clone(),
        };
        write_canonical(&layout.path(&merkle_name), &merkle)?;

        let capsule_id = CapsuleId::segment(&ctx.config.prefix, &mesh, seg, &rand8(&mut self.rng));
        let capsule = Capsule {
            capsule_id: capsule_id.clone(),
            ts: ctx.now(),
            provenance: SegmentProvenance {
                prev_sha256: self.state.prev_sha().to_string(),
                chain_prev: self.state.last.clone(),
                merkle_root: root.clone(),
            },
            payload: SegmentPayload {
                exec: exec_name,
                sla: sla_name,
                merkle: merkle_name,
            },
        };

        let keys = ctx.keyring.segment(&mesh, seg)?;
        let written = crate::signer::write_signed(ctx, &capsule, &keys.seg)?;

        let chain = chain_step(&self.state.last, &written.sha256);

        append_canonical(
            &layout.path(&OutputLayout::mesh_file(&mesh, "heartbeats.jsonl")),
            &Heartbeat {
                ts: ctx.now(),
                mesh: mesh.clone(),
                seg,
                ok: sla.ok,
                p95_ms: sla.p95_ms,
                chain: chain.clone(),
            },
        )?;

        let entry = LedgerEntry::new(&mesh, LedgerEvent::Segment, capsule_id.clone(), &written.sha256)
            .with("seg", seg)
            .with("chain", chain.clone())
            .with("merkle_root", root.clone());
        ctx.append_ledger(entry, &OutputLayout::attest(&mesh), &keys.led)?;

        // State moves only once every segment write has landed.
        self.state.advance(seg, capsule_id.clone(), &written.sha256);
        if sla.ok {
            self.ok_segments += 1;
        }
        self.record_anomalies(&sla);

        Ok(SegmentOutcome {
            seg,
            capsule_id,
            sha256: written.sha256,
            merkle_root: root,
            chain,
            ok: sla.ok,
            p95_ms: sla.p95_ms,
        })
    }

    /// Draw every cycle of a segment.
    fn simulate(&mut self, seg: u32) -> (SegmentExec, SegmentSla) {
        let mesh = self.mesh.name.as_str();
        let budget = self.ctx.config.budget;
        let mut pbft = String::new();
        let mut latencies = Vec::new();
        let mut cycles = Vec::new();

        for cycle in 1..=self.ctx.config.cycles {
            let mut caps = Vec::with_capacity(self.chain.len());
            for (j, cap) in self.chain.iter().enumerate() {
                let latency_ms = self.rng.gen_range(LATENCY_MS);
                let radius = if self.rng.gen_bool(P_LOW_RADIUS) {
                    Radius::Low
                } else {
                    Radius::Med
                };
                pbft = pbft_step(&pbft, mesh, seg, cycle, cap);
                latencies.push(latency_ms);
                caps.push(CapabilityRun {
                    cap: cap.clone(),
                    latency_ms,
                    usd: capability_usd(j),
                    radius,
                });
            }

            let usd = round4(caps.iter().map(|c| c.usd).sum());
            self.spend = round4(self.spend + usd);
            let mut ok = caps.iter().all(|c| c.radius == Radius::Low)
                && caps.iter().all(|c| c.usd < USD_CEILING)
                && self.spend <= budget;

            let (monetization, monetization_error) = match self.monetizer.as_mut() {
                None => (None, None),
                Some(m) => match m.settle(&mut self.monetize_rng) {
                    Ok(outcome) => (Some(outcome), None),
                    Err(e) => {
                        warn!(mesh, seg, cycle, error = %e, "monetization failed");
                        ok = false;
                        (None, Some(e.to_string()))
                    }
                },
            };
            self.totals.add(Totals {
                revenue: monetization.as_ref().map_or(0.0, |m| m.revenue()),
                cost: usd,
            });

            cycles.push(CycleRecord {
                cycle,
                caps,
                usd,
                spend: self.spend,
                ok,
                monetization,
                monetization_error,
            });
        }

        let p95_ms = p95(&latencies);
        let ok_cycles = cycles.iter().filter(|c| c.ok).count() as u32;
        let ok = ok_cycles == cycles.len() as u32 && p95_ms <= self.ctx.config.slo_ms;

        let sla = SegmentSla {
            mesh: mesh.to_string(),
            seg,
            p95_ms,
            slo_ms: self.ctx.config.slo_ms,
            ok_cycles,
            ok,
            spend: self.spend,
        };
        let exec = SegmentExec {
            mesh: mesh.to_string(),
            seg,
            chain: self.chain.clone(),
            cycles,
            pbft_hash: pbft,
        };
        (exec, sla)
    }

    fn record_anomalies(&mut self, sla: &SegmentSla) {
        if sla.p95_ms > sla.slo_ms {
            self.anomalies.push(Anomaly {
                seg: sla.seg,
                kind: "slo_breach".into(),
                detail: format!("p95 {}ms over {}ms", sla.p95_ms, sla.slo_ms),
            });
        }
        let cycles = self.ctx.config.cycles;
        if sla.ok_cycles < cycles {
            self.anomalies.push(Anomaly {
                seg: sla.seg,
                kind: "failed_cycles".into(),
                detail: format!("{} of {} cycles not ok", cycles - sla.ok_cycles, cycles),
            });
        }
        if sla.spend > self.ctx.config.budget {
            self.anomalies.push(Anomaly {
                seg: sla.seg,
                kind: "over_budget".into(),
                detail: format!("spend {} over {}", sla.spend, self.ctx.config.budget),
            });
        }
    }

    /// Write chain state, anomalies, segment links and the mesh DOT graph.
    fn persist_state(&self) -> Result<()> {
        let layout = &self.ctx.layout;
        let mesh = &self.mesh.name;

        write_canonical(&layout.path(&OutputLayout::chain_state(mesh)), &self.state)?;
        write_canonical(
            &layout.path(&OutputLayout::mesh_file(mesh, "anomalies.json")),
            &self.anomalies,
        )?;

        let links: Vec<SegmentLink> = self
            .state
            .segments
            .windows(2)
            .map(|pair| SegmentLink {
                from: pair[0].cid.to_string(),
                to: pair[1].cid.to_string(),
                sha: pair[1].sha.clone(),
            })
            .collect();
        write_canonical(
            &layout.path(&OutputLayout::mesh_file(mesh, "links_segments.json")),
            &links,
        )?;

        write_bytes(
            &layout.path(&OutputLayout::mesh_file(mesh, "links.dot")),
            graph::mesh_links_dot(&self.state).as_bytes(),
        )?;
        Ok(())
    }
}
