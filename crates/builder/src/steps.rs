//! Compile step and remove-on-build execution

use std::path::Path;

use avbuild_errors::{BuildError, Error};
use avbuild_events::{
    AppEvent, BuildEvent, EventEmitter, EventMeta, EventSender, ProgressReporter, WorkspaceEvent,
};
use avbuild_scene::{compile_steps, removal_steps, NodeId, SceneGraph, StepContext, StepError};
use avbuild_types::{BuildStage, Platform};
use avbuild_workspace::Workspace;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Progress window covered by the compile steps
pub const COMPILE_WINDOW: (f32, f32) = (0.20, 0.70);

/// Runs the pluggable steps found under the subject, one at a time.
pub struct StepRunner<'a> {
    build_id: Uuid,
    progress: &'a ProgressReporter,
    cancel: &'a CancellationToken,
    events: Option<EventSender>,
}

impl EventEmitter for StepRunner<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    // Steps, hooks and the follow-up persist all run while compiling
    fn enrich_event_meta(&self, _event: &AppEvent, meta: &mut EventMeta) {
        meta.tag_build(self.build_id, BuildStage::Compiling);
    }
}

impl<'a> StepRunner<'a> {
    #[must_use]
    pub fn new(
        build_id: Uuid,
        progress: &'a ProgressReporter,
        cancel: &'a CancellationToken,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            build_id,
            progress,
            cancel,
            events,
        }
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled.into());
        }
        Ok(())
    }

    /// Run every compile step under `root` in ascending priority. Each step
    /// finishes both phases before the next starts; the first error stops
    /// the run. Returns how many steps ran.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::StepFailed` naming the failing step, or
    /// `BuildError::Cancelled`.
    pub async fn run_compile_steps(
        &self,
        graph: &mut SceneGraph,
        root: NodeId,
        platform: Platform,
        temp_dir: &Path,
    ) -> Result<usize, Error> {
        let steps = compile_steps(graph, root);
        let count = steps.len();
        let (start, end) = COMPILE_WINDOW;
        let mut ran = 0;

        for (index, found) in steps.iter().enumerate() {
            self.check_cancelled()?;
            let Some(step) = found.behavior.compile_step() else {
                continue;
            };
            let name = found.behavior.type_name().to_string();
            self.progress
                .report_within(start, end, index, count, &format!("Running {name}"));

            // An earlier step may have stripped this one
            if !graph.has_behavior(found.node, &found.behavior) {
                debug!(step = %name, "compile step no longer attached, skipping");
                continue;
            }

            let failed = |err: StepError| BuildError::StepFailed {
                step: name.clone(),
                message: err.message,
            };
            let mut ctx = StepContext {
                graph: &mut *graph,
                node: found.node,
                platform,
                temp_dir,
            };
            step.compile(&mut ctx).map_err(failed)?;
            step.compile_async(&mut ctx).await.map_err(failed)?;

            let priority = step.priority();
            debug!(step = %name, priority, "compile step finished");
            self.emit(AppEvent::Build(BuildEvent::StepCompleted {
                build_id: self.build_id,
                step: name,
                priority,
            }));
            ran += 1;
        }

        self.progress.report(end, "Compile steps finished");
        Ok(ran)
    }

    /// Invoke every remove-on-build hook under `root`, then detach each
    /// hook's behaviour if it is still attached. Failures are collected so
    /// every hook gets its turn.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::RemovalFailed` listing every failed hook, or
    /// `BuildError::Cancelled`.
    pub fn run_removal_steps(
        &self,
        graph: &mut SceneGraph,
        root: NodeId,
        platform: Platform,
        temp_dir: &Path,
    ) -> Result<usize, Error> {
        let hooks = removal_steps(graph, root);
        let mut failures = Vec::new();

        for found in &hooks {
            self.check_cancelled()?;
            let Some(hook) = found.behavior.removal_step() else {
                continue;
            };
            let name = found.behavior.type_name();
            if !graph.has_behavior(found.node, &found.behavior) {
                debug!(step = %name, "removed by an earlier hook, skipping");
                continue;
            }

            let mut ctx = StepContext {
                graph: &mut *graph,
                node: found.node,
                platform,
                temp_dir,
            };
            match hook.on_remove_on_build(&mut ctx) {
                Ok(()) => {
                    if !graph.detach_behavior(found.node, &found.behavior) {
                        debug!(step = %name, "hook already detached its carrier");
                    }
                }
                Err(err) => {
                    warn!(step = %name, error = %err, "remove-on-build hook failed");
                    failures.push(format!("{name}: {err}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(BuildError::RemovalFailed {
                messages: failures.join("\n\t"),
            }
            .into());
        }
        info!(hooks = hooks.len(), "removed build-only behaviours");
        Ok(hooks.len())
    }

    /// Write every open document and rebuild the asset index
    ///
    /// # Errors
    ///
    /// Returns persistence or indexing errors from the workspace.
    pub async fn persist(&self, workspace: &mut Workspace) -> Result<(), Error> {
        self.check_cancelled()?;
        let documents = workspace.save_open_documents().await?;
        self.emit_workspace(WorkspaceEvent::Persisted { documents });
        let assets = workspace.refresh().await?;
        self.emit_workspace(WorkspaceEvent::Refreshed { assets });
        Ok(())
    }
}
