//! Graphviz DOT output.
//!
//! `{mesh}_links.dot` draws a mesh's segment chain from `genesis`;
//! `intermesh.dot` draws the ring of chain tips, each mesh pointing at the
//! next in declared order and the last pointing back at the first.

use std::fmt::Write;

use meshledger_core::{ChainState, GENESIS};

const TIP_LEN: usize = 12;

fn tip(digest: &str) -> &str {
    digest.get(..TIP_LEN).unwrap_or(digest)
}

/// The segment chain of one mesh.
pub fn mesh_links_dot(state: &ChainState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", state.mesh);
    out.push_str("  rankdir=LR;\n  node [shape=box];\n");
    let _ = writeln!(out, "  \"{GENESIS}\" [shape=circle];");

    let mut prev = GENESIS.to_string();
    for link in &state.segments {
        let _ = writeln!(
            out,
            "  \"{prev}\" -> \"{}\" [label=\"{}\"];",
            link.cid,
            tip(&link.chain)
        );
        prev = link.cid.to_string();
    }
    out.push_str("}\n");
    out
}

/// The intermesh ring over `(mesh, last_chain)` pairs.
pub fn intermesh_dot(rings: &[(String, String)]) -> String {
    let mut out = String::from("digraph intermesh {\n  rankdir=LR;\n  node [shape=ellipse];\n");
    for (mesh, last) in rings {
        let _ = writeln!(out, "  \"{mesh}\" [label=\"{mesh}\\n{}\"];", tip(last));
    }
    for (i, (mesh, _)) in rings.iter().enumerate() {
        let (next, _) = &rings[(i + 1) % rings.len()];
        let _ = writeln!(out, "  \"{mesh}\" -> \"{next}\";");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshledger_core::{sha256_hex, CapsuleId};

    #[test]
    fn test_mesh_links() {
        let mut state = ChainState::new("drip");
        state.advance(1, CapsuleId::segment("IMESH", "drip", 1, "0000000a"), &sha256_hex(b"1"));
        state.advance(2, CapsuleId::segment("IMESH", "drip", 2, "0000000b"), &sha256_hex(b"2"));

        let dot = mesh_links_dot(&state);
        assert!(dot.starts_with("digraph \"drip\" {"));
        assert!(dot.contains("\"genesis\" -> \"IMESH-DRIP-SEG1-0000000a\""));
        assert!(dot.contains("\"IMESH-DRIP-SEG1-0000000a\" -> \"IMESH-DRIP-SEG2-0000000b\""));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_ring_closes() {
        let rings = vec![
            ("drip".to_string(), "a".repeat(64)),
            ("pulse".to_string(), "b".repeat(64)),
            ("weave".to_string(), "c".repeat(64)),
        ];
        let dot = intermesh_dot(&rings);
        assert!(dot.contains("\"drip\" -> \"pulse\";"));
        assert!(dot.contains("\"pulse\" -> \"weave\";"));
        assert!(dot.contains("\"weave\" -> \"drip\";"));
        assert!(dot.contains("label=\"drip\\naaaaaaaaaaaa\""));
    }

    #[test]
    fn test_single_mesh_ring_is_a_self_loop() {
        let dot = intermesh_dot(&[("solo".to_string(), "d".repeat(64))]);
        assert!(dot.contains("\"solo\" -> \"solo\";"));
    }
}
