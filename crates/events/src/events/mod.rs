use serde::{Deserialize, Serialize};

use crate::EventSource;
use avbuild_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod build;
pub mod general;
pub mod progress;
pub mod workspace;

pub use build::*;
pub use general::*;
pub use progress::*;
pub use workspace::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug output)
    General(GeneralEvent),

    /// Build lifecycle: started, stage changes, finished
    Build(BuildEvent),

    /// Ratio/status progress of a running build
    Progress(ProgressEvent),

    /// Snapshot, restore, persistence and refresh of the workspace
    Workspace(WorkspaceEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Build(_) => EventSource::BUILD,
            Self::Progress(_) => EventSource::PROGRESS,
            Self::Workspace(_) => EventSource::WORKSPACE,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Workspace(WorkspaceEvent::RestoreFailed { .. }) => Level::ERROR,

            Self::Build(BuildEvent::Finished { result, .. }) if result.is_failed() => Level::WARN,
            Self::General(GeneralEvent::Warning { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Progress(ProgressEvent::Updated { .. })
            | Self::Workspace(
                WorkspaceEvent::Persisted { .. }
                | WorkspaceEvent::Refreshed { .. }
                | WorkspaceEvent::TempDirPrepared { .. },
            ) => Level::DEBUG,

            Self::Build(BuildEvent::StepCompleted { .. }) => Level::TRACE,

            _ => Level::INFO,
        }
    }

    /// Build the event belongs to, when its payload names one
    #[must_use]
    pub fn build_id(&self) -> Option<uuid::Uuid> {
        match self {
            Self::Build(
                BuildEvent::Started { build_id, .. }
                | BuildEvent::StageChanged { build_id, .. }
                | BuildEvent::StepCompleted { build_id, .. }
                | BuildEvent::Finished { build_id, .. },
            )
            | Self::Progress(ProgressEvent::Updated { build_id, .. }) => Some(*build_id),
            Self::General(_) | Self::Workspace(_) => None,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "avbuild::events::general",
            Self::Build(_) => "avbuild::events::build",
            Self::Progress(_) => "avbuild::events::progress",
            Self::Workspace(_) => "avbuild::events::workspace",
        }
    }
}
