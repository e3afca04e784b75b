//! Per-mesh descriptor files written before the first segment.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use meshledger_core::{Grant, MeshDef};
use meshledger_store::artifacts::write_canonical;
use meshledger_store::OutputLayout;

use crate::error::Result;
use crate::executor::capability_usd;

#[derive(Serialize)]
struct Capability<'a> {
    name: &'a str,
    index: usize,
    usd: f64,
}

#[derive(Serialize)]
struct Ontology<'a> {
    mesh: &'a str,
    verb: &'a str,
    chain: &'a [String],
    capabilities: Vec<Capability<'a>>,
}

#[derive(Serialize)]
struct RegistryEntry<'a> {
    agent: &'a str,
    capabilities: Vec<&'a str>,
}

#[derive(Serialize)]
struct Registry<'a> {
    mesh: &'a str,
    agents: Vec<RegistryEntry<'a>>,
}

#[derive(Serialize)]
struct Grants<'a> {
    mesh: &'a str,
    grants: &'a [Grant],
}

#[derive(Serialize)]
struct Policies<'a> {
    mesh: &'a str,
    policies: &'a BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct DagBase<'a> {
    mesh: &'a str,
    verb: &'a str,
    edges: &'a BTreeMap<String, Vec<String>>,
}

/// Write ontology, registry, grants, policies and DAG files for a mesh.
///
/// Returns the names written.
pub fn write_descriptors(
    layout: &OutputLayout,
    mesh: &MeshDef,
    chain: &[String],
) -> Result<Vec<String>> {
    let name = mesh.name.as_str();
    let mut written = Vec::new();

    let ontology = Ontology {
        mesh: name,
        verb: &mesh.verb,
        chain,
        capabilities: chain
            .iter()
            .enumerate()
            .map(|(index, cap)| Capability {
                name: cap,
                index,
                usd: capability_usd(index),
            })
            .collect(),
    };
    put(layout, name, "ontology.json", &ontology, &mut written)?;

    let registry = Registry {
        mesh: name,
        agents: mesh
            .agents
            .iter()
            .map(|agent| RegistryEntry {
                agent,
                capabilities: mesh
                    .grants
                    .iter()
                    .filter(|g| &g.agent == agent)
                    .map(|g| g.capability.as_str())
                    .collect(),
            })
            .collect(),
    };
    put(layout, name, "registry.json", &registry, &mut written)?;

    let grants = Grants {
        mesh: name,
        grants: &mesh.grants,
    };
    put(layout, name, "grants.json", &grants, &mut written)?;

    let policies = Policies {
        mesh: name,
        policies: &mesh.policies,
    };
    put(layout, name, "policies.json", &policies, &mut written)?;

    let dag = DagBase {
        mesh: name,
        verb: &mesh.verb,
        edges: &mesh.edges,
    };
    put(layout, name, "dag_base.json", &dag, &mut written)?;

    Ok(written)
}

fn put<T: Serialize>(
    layout: &OutputLayout,
    mesh: &str,
    suffix: &str,
    value: &T,
    written: &mut Vec<String>,
) -> Result<()> {
    let file = OutputLayout::mesh_file(mesh, suffix);
    write_canonical(&layout.path(&file), value)?;
    written.push(file);
    Ok(())
}
