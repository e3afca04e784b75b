//! Mesh planner: orders a mesh's capabilities into an execution chain.
//!
//! The chain is a post-order depth-first walk from the root verb. Successors
//! are visited in their declared order, each capability is emitted once (on
//! first completion), and the verb is always last. The order feeds the
//! rolling `pbft_hash`, so it must be reproducible.

use std::collections::HashSet;

use crate::error::PlannerError;
use crate::mesh::MeshDef;

/// Compute the execution chain for a mesh.
pub fn plan(mesh: &MeshDef) -> Result<Vec<String>, PlannerError> {
    mesh.validate_name()?;
    if mesh.verb.is_empty() {
        return Err(PlannerError::EmptyVerb {
            mesh: mesh.name.clone(),
        });
    }

    let mut walk = Walk {
        mesh,
        done: HashSet::new(),
        on_path: HashSet::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    walk.enter(&mesh.verb)?;
    while let Some(top) = walk.stack.last_mut() {
        let capability = top.capability;
        let next = mesh
            .edges
            .get(capability)
            .and_then(|successors| successors.get(top.next));
        match next {
            Some(successor) => {
                top.next += 1;
                walk.enter(successor)?;
            }
            None => walk.leave(),
        }
    }
    Ok(walk.order)
}

/// A capability on the current path and the index of its next successor.
struct Frame<'a> {
    capability: &'a str,
    next: usize,
}

/// Depth-first walk state. The path lives on an explicit stack, so a deep
/// chain cannot exhaust the thread's stack.
struct Walk<'a> {
    mesh: &'a MeshDef,
    done: HashSet<&'a str>,
    on_path: HashSet<&'a str>,
    stack: Vec<Frame<'a>>,
    order: Vec<String>,
}

impl<'a> Walk<'a> {
    fn enter(&mut self, capability: &'a str) -> Result<(), PlannerError> {
        // Capabilities are joined with ':' when folded into the pbft digest.
        if capability.is_empty() || capability.contains(':') {
            return Err(PlannerError::InvalidCapability {
                mesh: self.mesh.name.clone(),
                capability: capability.to_string(),
            });
        }
        if self.done.contains(capability) {
            return Ok(());
        }
        if !self.on_path.insert(capability) {
            return Err(PlannerError::Cycle {
                mesh: self.mesh.name.clone(),
                capability: capability.to_string(),
            });
        }
        self.stack.push(Frame {
            capability,
            next: 0,
        });
        Ok(())
    }

    /// Pop the top frame once all of its successors are done.
    fn leave(&mut self) {
        if let Some(Frame { capability, .. }) = self.stack.pop() {
            self.on_path.remove(capability);
            self.done.insert(capability);
            self.order.push(capability.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::builtin_mesh;

    #[test]
    fn test_single_capability() {
        let mesh = MeshDef::single("solo", "act");
        assert_eq!(plan(&mesh).unwrap(), vec!["act"]);
    }

    #[test]
    fn test_post_order_with_root_last() {
        let mesh = builtin_mesh("drip").unwrap();
        assert_eq!(
            plan(&mesh).unwrap(),
            vec!["segment_audience", "render", "compose", "throttle", "dispatch", "drip"]
        );
    }

    #[test]
    fn test_shared_successor_emitted_once() {
        let mesh = builtin_mesh("weave").unwrap();
        assert_eq!(
            plan(&mesh).unwrap(),
            vec!["collect", "meter", "invoice", "bill", "weave"]
        );
    }

    #[test]
    fn test_diamond() {
        let mesh = MeshDef::single("diamond", "top")
            .with_edges("top", &["left", "right"])
            .with_edges("left", &["bottom"])
            .with_edges("right", &["bottom"]);
        assert_eq!(plan(&mesh).unwrap(), vec!["bottom", "left", "right", "top"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mesh = MeshDef::single("loop", "a")
            .with_edges("a", &["b"])
            .with_edges("b", &["c"])
            .with_edges("c", &["a"]);
        assert_eq!(
            plan(&mesh),
            Err(PlannerError::Cycle {
                mesh: "loop".into(),
                capability: "a".into()
            })
        );
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let mesh = MeshDef::single("selfie", "a").with_edges("a", &["a"]);
        assert!(matches!(plan(&mesh), Err(PlannerError::Cycle { .. })));
    }

    #[test]
    fn test_ill_formed_names() {
        assert!(matches!(
            plan(&MeshDef::single("m", "")),
            Err(PlannerError::EmptyVerb { .. })
        ));
        let mesh = MeshDef::single("m", "a").with_edges("a", &["x:y"]);
        assert!(matches!(
            plan(&mesh),
            Err(PlannerError::InvalidCapability { .. })
        ));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let depth = 200_000;
        let names: Vec<String> = (0..depth).map(|i| format!("c{i}")).collect();
        let mut mesh = MeshDef::single("deep", "c0");
        for pair in names.windows(2) {
            mesh = mesh.with_edges(&pair[0], &[pair[1].as_str()]);
        }

        let chain = plan(&mesh).unwrap();
        assert_eq!(chain.len(), depth);
        assert_eq!(chain[0], names[depth - 1]);
        assert_eq!(chain[depth - 1], "c0");
    }

    #[test]
    fn test_deep_cycle_is_rejected() {
        let mut mesh = MeshDef::single("ring", "c0");
        for i in 0..50_000 {
            let next = format!("c{}", (i + 1) % 50_000);
            mesh = mesh.with_edges(&format!("c{i}"), &[next.as_str()]);
        }
        assert_eq!(
            plan(&mesh),
            Err(PlannerError::Cycle {
                mesh: "ring".into(),
                capability: "c0".into()
            })
        );
    }

    #[test]
    fn test_plan_is_reproducible() {
        let mesh = builtin_mesh("pulse").unwrap();
        assert_eq!(plan(&mesh).unwrap(), plan(&mesh).unwrap());
    }
}
