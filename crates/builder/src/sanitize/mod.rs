//! Tombstone removal before packaging
//!
//! * sweep - strip tombstones from every unlocked node
//! * residual check - anything left is retried once with the forced pass
//! * final guard - one more sweep right before serialization

pub mod reports;

use avbuild_errors::{BuildError, Error};
use avbuild_events::{EventEmitter, EventSender};
use avbuild_scene::{NodeId, SceneGraph};
use tracing::{debug, warn};

pub use reports::{Offender, SanitizeReport};

/// Remove tombstones from every unlocked node under `root`
pub fn sweep(graph: &mut SceneGraph, root: NodeId) -> SanitizeReport {
    remove_tombstones(graph, root, false)
}

/// Remove tombstones under `root`, locked nodes included
pub fn force_clean(graph: &mut SceneGraph, root: NodeId) -> SanitizeReport {
    let mut report = remove_tombstones(graph, root, true);
    report.forced = std::mem::take(&mut report.removed);
    report
}

fn remove_tombstones(graph: &mut SceneGraph, root: NodeId, include_locked: bool) -> SanitizeReport {
    let mut report = SanitizeReport::ok();
    for id in graph.descendants(root) {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if node.is_locked() && !include_locked {
            continue;
        }
        let names: Vec<String> = node
            .attachments()
            .iter()
            .filter(|slot| slot.is_missing())
            .map(|slot| slot.type_name().to_string())
            .collect();
        if names.is_empty() {
            continue;
        }
        let path = graph.node_path(id);
        graph.remove_missing(id);
        report
            .removed
            .extend(names.into_iter().map(|name| format!("{path}: {name}")));
    }
    report
}

/// Every tombstone still attached under `root`
#[must_use]
pub fn residual(graph: &SceneGraph, root: NodeId) -> Vec<Offender> {
    let mut offenders = Vec::new();
    for id in graph.descendants(root) {
        let Some(node) = graph.node(id) else {
            continue;
        };
        for index in graph.missing_indices(id) {
            offenders.push(Offender {
                node: graph.node_path(id),
                index,
                type_name: node.attachments()[index].type_name().to_string(),
            });
        }
    }
    offenders
}

/// Fail with every offender listed, one per line
///
/// # Errors
///
/// Returns `BuildError::MissingBehaviors` if `offenders` is non-empty.
pub fn ensure_clean(offenders: &[Offender]) -> Result<(), Error> {
    if offenders.is_empty() {
        return Ok(());
    }
    let offenders = offenders
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    Err(BuildError::MissingBehaviors { offenders }.into())
}

/// Runs the sweep and residual check passes over a subject subtree
#[derive(Debug, Clone, Default)]
pub struct GraphSanitizer {
    events: Option<EventSender>,
}

impl EventEmitter for GraphSanitizer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl GraphSanitizer {
    #[must_use]
    pub fn new(events: Option<EventSender>) -> Self {
        Self { events }
    }

    /// Sweep, check, force once, check again
    ///
    /// # Errors
    ///
    /// Returns `BuildError::MissingBehaviors` if tombstones survive the
    /// forced pass.
    pub fn sanitize(&self, graph: &mut SceneGraph, root: NodeId) -> Result<SanitizeReport, Error> {
        let mut report = sweep(graph, root);
        if !report.removed.is_empty() {
            debug!(removed = report.removed.len(), "removed missing behaviours");
        }

        let remaining = residual(graph, root);
        if !remaining.is_empty() {
            warn!(remaining = remaining.len(), "missing behaviours survived the sweep, forcing");
            let forced = force_clean(graph, root);
            self.emit_warning_with_context(
                "Forced removal of missing behaviours on locked nodes",
                forced.render("Forced cleanup"),
            );
            report.absorb(forced);
        }

        report.offenders = residual(graph, root);
        ensure_clean(&report.offenders)?;
        Ok(report)
    }

    /// Last sweep right before serialization
    ///
    /// # Errors
    ///
    /// Returns `BuildError::MissingBehaviors` if anything survives.
    pub fn final_guard(&self, graph: &mut SceneGraph, root: NodeId) -> Result<usize, Error> {
        let mut report = sweep(graph, root);
        report.absorb(force_clean(graph, root));
        let removed = report.total_removed();
        if removed > 0 {
            self.emit_warning_with_context(
                "Missing behaviours reappeared before serialization",
                report.render("Final guard"),
            );
        }
        ensure_clean(&residual(graph, root))?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avbuild_scene::{Attachment, MissingBehavior};
    use serde_json::Value;

    fn tombstone(name: &str) -> Attachment {
        Attachment::Missing(MissingBehavior {
            type_name: name.to_string(),
            data: Value::Null,
            reason: "unregistered".to_string(),
        })
    }

    fn graph_with_tombstones() -> (SceneGraph, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let locked = graph.add_child(root, "Armature").unwrap();
        graph.attach(root, tombstone("ghost")).unwrap();
        graph.attach(locked, tombstone("phantom")).unwrap();
        graph.set_locked(locked, true).unwrap();
        (graph, root, locked)
    }

    #[test]
    fn sweep_skips_locked_nodes() {
        let (mut graph, root, _) = graph_with_tombstones();
        let report = sweep(&mut graph, root);
        assert_eq!(report.removed, vec!["Avatar: ghost".to_string()]);
        let left = residual(&graph, root);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].node, "Avatar/Armature");
    }

    #[test]
    fn second_sweep_on_clean_graph_is_noop() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        graph.attach(root, tombstone("ghost")).unwrap();
        assert_eq!(sweep(&mut graph, root).total_removed(), 1);
        assert_eq!(sweep(&mut graph, root).total_removed(), 0);
    }

    #[test]
    fn sanitize_forces_locked_leftovers() {
        let (mut graph, root, locked) = graph_with_tombstones();
        let report = GraphSanitizer::default().sanitize(&mut graph, root).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.forced, vec!["Avatar/Armature: phantom".to_string()]);
        assert!(graph.missing_indices(locked).is_empty());
    }

    #[test]
    fn offenders_are_enumerated_in_the_error() {
        let (graph, root, _) = graph_with_tombstones();
        let err = ensure_clean(&residual(&graph, root)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("GameObject 'Avatar' at component index 0"));
        assert!(message.contains("GameObject 'Avatar/Armature' at component index 0"));
    }

    #[test]
    fn sanitizer_leaves_outside_subtrees_alone() {
        let mut graph = SceneGraph::new();
        let subject = graph.add_root("Avatar");
        let other = graph.add_root("Stage");
        graph.attach(other, tombstone("ghost")).unwrap();
        GraphSanitizer::default().sanitize(&mut graph, subject).unwrap();
        assert_eq!(graph.missing_indices(other), vec![0]);
    }
}
