//! Read-only checks run before a build touches anything

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use avbuild_errors::BuildError;
use avbuild_scene::NodeId;
use avbuild_types::{BuildResult, BuildStatus, Platform};
use avbuild_workspace::{DocumentHandle, Workspace};

use crate::request::{BuildRequest, SubjectRef};

/// State of the host application the pipeline runs inside
pub trait HostEnvironment: Send + Sync {
    /// The host is recompiling its own code
    fn is_compiling(&self) -> bool;

    /// The host is in a live, interactive run mode
    fn is_playing(&self) -> bool;

    /// Platform a `None` target resolves to
    fn current_platform(&self) -> Option<Platform>;
}

/// Host with flags set by the caller. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct StaticHost {
    compiling: AtomicBool,
    playing: AtomicBool,
    platform: Option<Platform>,
}

impl StaticHost {
    /// Host reporting the platform avbuild was compiled for
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(Platform::current())
    }

    #[must_use]
    pub fn with_platform(platform: Option<Platform>) -> Self {
        Self {
            compiling: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            platform,
        }
    }

    pub fn set_compiling(&self, compiling: bool) {
        self.compiling.store(compiling, Ordering::SeqCst);
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }
}

impl HostEnvironment for StaticHost {
    fn is_compiling(&self) -> bool {
        self.compiling.load(Ordering::SeqCst)
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn current_platform(&self) -> Option<Platform> {
        self.platform
    }
}

/// A request turned away before any mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: BuildStatus,
    pub message: String,
}

impl Rejection {
    pub fn new(status: BuildStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn into_result(self) -> BuildResult {
        BuildResult::failed(self.status, self.message)
    }
}

/// Echo of a request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub platform: Platform,
    pub output_dir: PathBuf,
}

/// Checks host state and the requested target, in order, stopping at the
/// first failure. The build lock itself is checked by the coordinator when it
/// acquires it.
pub struct PrerequisiteValidator<'a> {
    host: &'a dyn HostEnvironment,
    supported: &'a [Platform],
}

impl<'a> PrerequisiteValidator<'a> {
    #[must_use]
    pub fn new(host: &'a dyn HostEnvironment, supported: &'a [Platform]) -> Self {
        Self { host, supported }
    }

    /// # Errors
    ///
    /// Returns the first [`Rejection`] found.
    pub fn validate(&self, request: &BuildRequest) -> Result<Validated, Rejection> {
        if self.host.is_compiling() {
            return Err(Rejection::new(
                BuildStatus::EDITOR_COMPILING,
                "the host is compiling, try again when it is idle",
            ));
        }
        if self.host.is_playing() {
            return Err(Rejection::new(
                BuildStatus::EDITOR_PLAYING,
                "the host is in play mode, stop it before building",
            ));
        }
        let Some(platform) = request.target else {
            return Err(Rejection::new(
                BuildStatus::INVALID_TARGET,
                BuildError::InvalidTarget.to_string(),
            ));
        };
        if !self.supported.contains(&platform) {
            return Err(Rejection::new(
                BuildStatus::UNSUPPORTED_TARGET,
                BuildError::UnsupportedTarget {
                    platform: platform.to_string(),
                }
                .to_string(),
            ));
        }
        Ok(Validated {
            platform,
            output_dir: request.output_dir.clone(),
        })
    }
}

/// Resolve the subject to a loaded document and an active node
///
/// # Errors
///
/// Returns an `INVALID_GAME_OBJECT` rejection if the document is not open
/// and loaded, the node does not exist, or the node is inactive.
pub fn resolve_subject(
    workspace: &Workspace,
    subject: &SubjectRef,
) -> Result<(DocumentHandle, NodeId), Rejection> {
    let invalid = |message: String| {
        Rejection::new(
            BuildStatus::INVALID_GAME_OBJECT,
            BuildError::InvalidSubject { message }.to_string(),
        )
    };

    let handle = workspace
        .find_document(&subject.document)
        .filter(|handle| workspace.is_open(*handle))
        .ok_or_else(|| invalid(format!("scene '{}' is not open", subject.document)))?;
    let graph = workspace
        .document(handle)
        .and_then(|doc| doc.graph())
        .ok_or_else(|| invalid(format!("scene '{}' is not loaded", subject.document)))?;
    let node = graph
        .find_path(&subject.node)
        .ok_or_else(|| invalid(format!("no node at '{}'", subject.node)))?;
    if !graph.is_active_in_hierarchy(node) {
        return Err(invalid(format!("node '{}' is inactive", subject.node)));
    }
    Ok((handle, node))
}
