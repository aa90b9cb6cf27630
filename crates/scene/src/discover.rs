//! Capability discovery over a subject subtree

use std::sync::Arc;

use crate::behavior::{same_behavior, Attachment, Behavior};
use crate::graph::{NodeId, SceneGraph};

/// A behaviour found during a walk, with the node that carries it
#[derive(Debug, Clone)]
pub struct Discovered {
    pub node: NodeId,
    pub behavior: Arc<dyn Behavior>,
}

fn collect(
    graph: &SceneGraph,
    root: NodeId,
    wanted: impl Fn(&dyn Behavior) -> bool,
) -> Vec<Discovered> {
    let mut found: Vec<Discovered> = Vec::new();
    for id in graph.descendants(root) {
        let Some(node) = graph.node(id) else {
            continue;
        };
        for attachment in node.attachments() {
            let Attachment::Behavior(behavior) = attachment else {
                continue;
            };
            if !wanted(behavior.as_ref()) {
                continue;
            }
            if found.iter().any(|d| same_behavior(&d.behavior, behavior)) {
                continue;
            }
            found.push(Discovered {
                node: id,
                behavior: Arc::clone(behavior),
            });
        }
    }
    found
}

/// Compile steps under `root`, sorted by ascending priority.
/// Equal priorities keep walk order.
#[must_use]
pub fn compile_steps(graph: &SceneGraph, root: NodeId) -> Vec<Discovered> {
    let mut steps = collect(graph, root, |b| b.compile_step().is_some());
    steps.sort_by_key(|d| d.behavior.compile_step().map_or(i32::MAX, |s| s.priority()));
    steps
}

/// Remove-on-build hooks under `root`, in walk order
#[must_use]
pub fn removal_steps(graph: &SceneGraph, root: NodeId) -> Vec<Discovered> {
    collect(graph, root, |b| b.removal_step().is_some())
}
