//! Mesh definitions: a named DAG of capabilities rooted at a verb.
//!
//! A mesh is immutable for the duration of a run. Its execution order is
//! computed by [`crate::planner::plan`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::PlannerError;

/// Names of the meshes that ship with the ledger, in default run order.
pub const BUILTIN_MESHES: &[&str] = &["drip", "pulse", "weave"];

/// Permission for an agent to exercise a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub agent: String,
    pub capability: String,
    pub scope: String,
}

/// A mesh definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDef {
    /// Mesh name, `[a-z0-9_]+`.
    pub name: String,

    /// The root capability of the DAG.
    pub verb: String,

    /// Adjacency: capability → successor capabilities, in walk order.
    #[serde(default)]
    pub edges: BTreeMap<String, Vec<String>>,

    /// Agents registered on the mesh.
    #[serde(default)]
    pub agents: Vec<String>,

    #[serde(default)]
    pub grants: Vec<Grant>,

    #[serde(default)]
    pub policies: BTreeMap<String, Value>,
}

impl MeshDef {
    /// A mesh whose chain is just its verb.
    pub fn single(name: &str, verb: &str) -> Self {
        Self {
            name: name.to_string(),
            verb: verb.to_string(),
            edges: BTreeMap::new(),
            agents: Vec::new(),
            grants: Vec::new(),
            policies: BTreeMap::new(),
        }
    }

    /// Add an edge list for `from`.
    pub fn with_edges(mut self, from: &str, to: &[&str]) -> Self {
        self.edges.insert(
            from.to_string(),
            to.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Register agents.
    pub fn with_agents(mut self, agents: &[&str]) -> Self {
        self.agents = agents.iter().map(|s| s.to_string()).collect();
        self
    }

    fn grant(mut self, agent: &str, capability: &str, scope: &str) -> Self {
        self.grants.push(Grant {
            agent: agent.to_string(),
            capability: capability.to_string(),
            scope: scope.to_string(),
        });
        self
    }

    fn policy(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.policies.insert(key.to_string(), value.into());
        self
    }

    /// Check the mesh name.
    ///
    /// Names appear upper-cased inside capsule ids and are split on `-`, so
    /// they are restricted to lowercase alphanumerics and `_`.
    pub fn validate_name(&self) -> Result<(), PlannerError> {
        if is_identifier(&self.name) {
            Ok(())
        } else {
            Err(PlannerError::InvalidMeshName(self.name.clone()))
        }
    }
}

/// `[a-z0-9_]+`
pub(crate) fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Look up a built-in mesh by name.
pub fn builtin_mesh(name: &str) -> Option<MeshDef> {
    let mesh = match name {
        "drip" => MeshDef::single("drip", "drip")
            .with_edges("drip", &["segment_audience", "compose", "dispatch"])
            .with_edges("compose", &["render"])
            .with_edges("dispatch", &["throttle"])
            .with_agents(&["scout", "scribe", "courier"])
            .grant("scout", "segment_audience", "read")
            .grant("scribe", "compose", "write")
            .grant("courier", "dispatch", "send")
            .policy("max_sends_per_minute", 600)
            .policy("pii", "hashed"),
        "pulse" => MeshDef::single("pulse", "pulse")
            .with_edges("pulse", &["probe", "bid"])
            .with_edges("probe", &["sample"])
            .with_edges("bid", &["settle"])
            .with_agents(&["atlas", "beacon", "cinder", "delta"])
            .grant("atlas", "probe", "read")
            .grant("beacon", "bid", "bid")
            .grant("cinder", "bid", "bid")
            .grant("delta", "settle", "write")
            .policy("reserve_price", 2.5)
            .policy("auction", "min_bid"),
        "weave" => MeshDef::single("weave", "weave")
            .with_edges("weave", &["meter", "bill"])
            .with_edges("meter", &["collect"])
            .with_edges("bill", &["meter", "invoice"])
            .with_agents(&["loom", "shuttle"])
            .grant("loom", "meter", "read")
            .grant("shuttle", "bill", "write")
            .policy("billing", "tiered")
            .policy("currency", "USD"),
        _ => return None,
    };
    Some(mesh)
}
