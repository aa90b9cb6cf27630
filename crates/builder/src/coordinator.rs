//! Top-level build state machine
//!
//! `Idle -> Validating -> Preparing -> Compiling -> Processing -> Packaging ->
//! Completed`, or `Failed` from any non-idle stage. Once `Preparing` begins,
//! every failure goes through one rollback path that restores the workspace
//! layout captured at the start of that stage.

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use avbuild_errors::{BuildError, Error, UserFacingError};
use avbuild_events::{
    AppEvent, EventEmitter, EventMeta, EventSender, ProgressReporter, WorkspaceEvent,
};
use avbuild_scene::{NodeId, SceneGraph};
use avbuild_types::{BuildResult, BuildStage, BuildStatus};
use avbuild_workspace::{
    Document, DocumentHandle, SharedWorkspace, Workspace, WorkspaceGuard, WorkspaceSnapshot,
    DOCUMENT_EXTENSION,
};
use chrono::Local;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::naming::ArtifactNamer;
use crate::packaging::{backends_from_names, Packager, PackagingBackend};
use crate::prerequisites::{resolve_subject, HostEnvironment, PrerequisiteValidator, Validated};
use crate::request::{BuildRequest, BuildSettings};
use crate::sanitize::GraphSanitizer;
use crate::steps::StepRunner;

const ALREADY_BUILDING: &str = "a build is already running";

/// Holds the build flag for one run; releasing it also returns the stage to
/// `Idle`.
struct BuildLock<'a> {
    building: &'a AtomicBool,
    stage: &'a AtomicU8,
}

impl<'a> BuildLock<'a> {
    fn acquire(building: &'a AtomicBool, stage: &'a AtomicU8) -> Option<Self> {
        building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { building, stage })
    }
}

impl Drop for BuildLock<'_> {
    fn drop(&mut self) {
        self.stage.store(BuildStage::Idle as u8, Ordering::Release);
        self.building.store(false, Ordering::Release);
    }
}

/// Per-run state threaded through the stages
struct Run<'a> {
    build_id: Uuid,
    progress: &'a ProgressReporter,
    cancel: &'a CancellationToken,
    guard: &'a WorkspaceGuard,
    stage: &'a AtomicU8,
    events: Option<&'a EventSender>,
}

impl EventEmitter for Run<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events
    }

    fn enrich_event_meta(&self, _event: &AppEvent, meta: &mut EventMeta) {
        meta.tag_build(
            self.build_id,
            BuildStage::from_u8(self.stage.load(Ordering::Acquire)),
        );
    }
}

impl Run<'_> {
    fn checkpoint(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled.into());
        }
        Ok(())
    }
}

pub struct BuildCoordinator {
    workspace: SharedWorkspace,
    host: Arc<dyn HostEnvironment>,
    settings: BuildSettings,
    packager: Packager,
    events: Option<EventSender>,
    building: AtomicBool,
    stage: AtomicU8,
}

impl EventEmitter for BuildCoordinator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    fn enrich_event_meta(&self, event: &AppEvent, meta: &mut EventMeta) {
        if let Some(build_id) = event.build_id() {
            meta.tag_build(build_id, self.stage());
        }
    }
}

impl BuildCoordinator {
    /// # Errors
    ///
    /// Returns `PackageError::UnknownBackend` if `settings.backends` names a
    /// backend that does not exist.
    pub fn new(
        workspace: SharedWorkspace,
        host: Arc<dyn HostEnvironment>,
        settings: BuildSettings,
    ) -> Result<Self, Error> {
        let packager = Packager::new(backends_from_names(&settings.backends)?, settings.bundle);
        Ok(Self {
            workspace,
            host,
            settings,
            packager,
            events: None,
            building: AtomicBool::new(false),
            stage: AtomicU8::new(BuildStage::Idle as u8),
        })
    }

    #[must_use]
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.packager = self.packager.with_events(Some(events.clone()));
        self.events = Some(events);
        self
    }

    /// Replace the configured strategy list
    #[must_use]
    pub fn with_backends(mut self, backends: Vec<Arc<dyn PackagingBackend>>) -> Self {
        self.packager =
            Packager::new(backends, self.settings.bundle).with_events(self.events.clone());
        self
    }

    #[must_use]
    pub fn stage(&self) -> BuildStage {
        BuildStage::from_u8(self.stage.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn workspace(&self) -> SharedWorkspace {
        Arc::clone(&self.workspace)
    }

    #[must_use]
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    fn set_stage(&self, build_id: Uuid, stage: BuildStage) {
        self.stage.store(stage as u8, Ordering::Release);
        debug!(%build_id, %stage, "stage changed");
        self.emit_stage_changed(build_id, stage);
    }

    /// Run one build. Always returns a result; errors and panics inside the
    /// pipeline become `Failed`.
    pub async fn build(&self, mut request: BuildRequest, cancel: CancellationToken) -> BuildResult {
        let Some(_lock) = BuildLock::acquire(&self.building, &self.stage) else {
            debug!(document = %request.subject.document, "rejecting build, lock is held");
            return BuildResult::failed(BuildStatus::ALREADY_BUILDING, ALREADY_BUILDING);
        };

        let build_id = Uuid::new_v4();
        let started = Instant::now();
        if request.target.is_none() {
            request.target = self.host.current_platform();
        }
        info!(%build_id, document = %request.subject.document, subject = %request.subject.node, "build started");
        self.emit_build_started(build_id, request.info());

        let progress = ProgressReporter::new(build_id)
            .with_sink(request.progress.clone())
            .with_events(self.events.clone());

        let result = match AssertUnwindSafe(self.run(build_id, &mut request, &progress, &cancel))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%build_id, %message, "build panicked");
                BuildResult::failed(
                    BuildStatus::FAILED,
                    BuildError::Panicked { message }.to_string(),
                )
            }
        };

        let terminal = if result.is_failed() {
            BuildStage::Failed
        } else {
            BuildStage::Completed
        };
        self.set_stage(build_id, terminal);
        self.emit_build_finished(build_id, result.clone(), started.elapsed());
        result
    }

    async fn run(
        &self,
        build_id: Uuid,
        request: &mut BuildRequest,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> BuildResult {
        self.set_stage(build_id, BuildStage::Validating);
        progress.report(0.0, "Validating");
        if cancel.is_cancelled() {
            return BuildResult::failed(BuildStatus::FAILED, BuildError::Cancelled.to_string());
        }

        let validator =
            PrerequisiteValidator::new(self.host.as_ref(), &self.settings.supported_platforms);
        let validated = match validator.validate(request) {
            Ok(validated) => validated,
            Err(rejection) => {
                info!(%build_id, kind = rejection.status.kind_name(), "build rejected");
                return rejection.into_result();
            }
        };

        let mut workspace = self.workspace.lock().await;
        let (document, subject) = match resolve_subject(&workspace, &request.subject) {
            Ok(resolved) => resolved,
            Err(rejection) => {
                info!(%build_id, kind = rejection.status.kind_name(), "build rejected");
                return rejection.into_result();
            }
        };
        progress.report(0.05, "Validated");

        self.set_stage(build_id, BuildStage::Preparing);
        let guard = WorkspaceGuard::new(self.events.clone());
        let snapshot = guard.snapshot(&workspace);
        let run = Run {
            build_id,
            progress,
            cancel,
            guard: &guard,
            stage: &self.stage,
            events: self.events.as_ref(),
        };

        let outcome = AssertUnwindSafe(self.execute(
            &run,
            &mut workspace,
            request,
            &validated,
            document,
            subject,
        ))
        .catch_unwind()
        .await;
        let err: Error = match outcome {
            Ok(Ok(output)) => {
                snapshot.discard();
                progress.report(1.0, "Build complete");
                info!(%build_id, path = %output.display(), "build succeeded");
                return BuildResult::success(output);
            }
            Ok(Err(err)) => err,
            Err(panic) => BuildError::Panicked {
                message: panic_message(panic.as_ref()),
            }
            .into(),
        };

        self.rollback(&guard, &mut workspace, snapshot).await;
        let message = err.user_message().into_owned();
        if err.is_cancelled() {
            warn!(%build_id, "build cancelled");
        } else {
            error!(%build_id, error = %message, "build failed");
        }
        BuildResult::failed(BuildStatus::FAILED, message)
    }

    async fn execute(
        &self,
        run: &Run<'_>,
        workspace: &mut Workspace,
        request: &mut BuildRequest,
        validated: &Validated,
        document: DocumentHandle,
        subject: NodeId,
    ) -> Result<PathBuf, Error> {
        let platform = validated.platform;

        // Preparing
        run.checkpoint()?;
        run.progress.report(0.10, "Preparing build");
        let document_name = workspace
            .document(document)
            .map(|doc| doc.name().to_string())
            .ok_or_else(|| Error::internal(format!("document {document} vanished")))?;
        // Empty values count as absent
        if request.filename.as_ref().is_some_and(String::is_empty) {
            request.filename = None;
        }
        if request
            .temp_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            request.temp_dir = None;
        }
        let filename = request
            .filename
            .get_or_insert_with(|| {
                ArtifactNamer::new(self.settings.extension.as_str()).file_name(
                    &document_name,
                    platform,
                    &Local::now(),
                )
            })
            .clone();
        let temp_dir = request
            .temp_dir
            .get_or_insert_with(|| ArtifactNamer::temp_dir(&self.settings.temp_root))
            .clone();
        run.guard.prepare_temp_dir(&temp_dir).await?;
        let documents = workspace.save_open_documents().await?;
        run.emit_workspace(WorkspaceEvent::Persisted { documents });

        // Compiling
        self.set_stage(run.build_id, BuildStage::Compiling);
        run.checkpoint()?;
        run.progress.report(0.20, "Running compile steps");
        let window = workspace
            .layout()
            .entries
            .iter()
            .find(|entry| entry.handle == document)
            .map_or(0, |entry| entry.window);
        let build_copy = workspace.fork_document(
            document,
            document_name.clone(),
            temp_dir.join(format!("{document_name}.{DOCUMENT_EXTENSION}")),
            window,
        )?;
        let steps = StepRunner::new(run.build_id, run.progress, run.cancel, self.events.clone());
        {
            let graph = build_graph(workspace, build_copy)?;
            steps
                .run_compile_steps(graph, subject, platform, &temp_dir)
                .await?;
            steps.run_removal_steps(graph, subject, platform, &temp_dir)?;
            if !graph.contains(subject) {
                return Err(BuildError::InvalidSubject {
                    message: "the subject was removed by a build step".to_string(),
                }
                .into());
            }
        }
        steps.persist(workspace).await?;

        // Processing
        self.set_stage(run.build_id, BuildStage::Processing);
        run.checkpoint()?;
        run.progress.report(0.60, "Processing subject");
        let sanitizer = GraphSanitizer::new(self.events.clone());
        {
            let graph = build_graph(workspace, build_copy)?;
            sanitizer.sanitize(graph, subject)?;
            run.progress.report(0.75, "Serializing subject");
            sanitizer.final_guard(graph, subject)?;
            self.packager
                .serialize_prefab(graph, subject, &temp_dir, &document_name, platform)
                .await?;
        }
        let assets = workspace.refresh().await?;
        run.emit_workspace(WorkspaceEvent::Refreshed { assets });
        run.progress.report(0.80, "Subject serialized");

        // Packaging
        self.set_stage(run.build_id, BuildStage::Packaging);
        run.checkpoint()?;
        let artifacts = self
            .packager
            .collect_artifacts(&temp_dir, workspace.assets())
            .await?;
        let output = self
            .packager
            .package(
                artifacts,
                &validated.output_dir,
                &filename,
                platform,
                run.progress,
                run.cancel,
            )
            .await?;

        run.progress.report(0.95, "Cleaning up");
        workspace.close_document(build_copy)?;
        Ok(output)
    }

    /// Restore the snapshot. A restore failure is logged and reported as an
    /// event; the caller still sees the original error.
    async fn rollback(
        &self,
        guard: &WorkspaceGuard,
        workspace: &mut Workspace,
        snapshot: WorkspaceSnapshot,
    ) {
        if let Err(err) = guard.restore(workspace, snapshot).await {
            error!(error = %err, "workspace restore failed");
        }
    }
}

fn build_graph(workspace: &mut Workspace, handle: DocumentHandle) -> Result<&mut SceneGraph, Error> {
    workspace
        .document_mut(handle)
        .and_then(Document::graph_mut)
        .ok_or_else(|| Error::internal("build copy is not loaded"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let building = AtomicBool::new(false);
        let stage = AtomicU8::new(BuildStage::Compiling as u8);
        let first = BuildLock::acquire(&building, &stage).unwrap();
        assert!(BuildLock::acquire(&building, &stage).is_none());
        drop(first);
        assert!(!building.load(Ordering::Acquire));
        assert_eq!(BuildStage::from_u8(stage.load(Ordering::Acquire)), BuildStage::Idle);
        assert!(BuildLock::acquire(&building, &stage).is_some());
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
