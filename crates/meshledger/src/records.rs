//! JSON records written alongside capsules.
//!
//! Field order here is the field order on disk.

use serde::{Deserialize, Serialize};

use crate::monetize::Monetization;

/// Risk radius drawn per capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Radius {
    Low,
    Med,
}

/// One capability's execution inside a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityRun {
    pub cap: String,
    pub latency_ms: u32,
    pub usd: f64,
    pub radius: Radius,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub cycle: u32,
    pub caps: Vec<CapabilityRun>,
    /// USD spent by this cycle.
    pub usd: f64,
    /// Mesh spend after this cycle.
    pub spend: f64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetization: Option<Monetization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetization_error: Option<String>,
}

/// `{mesh}_seg_{n}_exec.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentExec {
    pub mesh: String,
    pub seg: u32,
    pub chain: Vec<String>,
    pub cycles: Vec<CycleRecord>,
    pub pbft_hash: String,
}

/// `{mesh}_seg_{n}_sla.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSla {
    pub mesh: String,
    pub seg: u32,
    pub p95_ms: u32,
    pub slo_ms: u32,
    pub ok_cycles: u32,
    pub ok: bool,
    pub spend: f64,
}

/// A Merkle file: the files it covers, their content hashes, and the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleFile {
    pub files: Vec<String>,
    pub hashes: Vec<String>,
    pub root: String,
}

/// One line of `{mesh}_heartbeats.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub ts: String,
    pub mesh: String,
    pub seg: u32,
    pub ok: bool,
    pub p95_ms: u32,
    pub chain: String,
}

/// An entry of `{mesh}_anomalies.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub seg: u32,
    pub kind: String,
    pub detail: String,
}

/// An edge of `{mesh}_links_segments.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLink {
    pub from: String,
    pub to: String,
    pub sha: String,
}
