use avbuild_types::{BuildResult, BuildStage, Platform};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Serializable view of a build request as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequestInfo {
    /// Document name the subject lives in
    pub document: String,
    /// Slash separated node path of the subject
    pub subject: String,
    /// Requested platform; `None` means "resolve to the host platform"
    pub target: Option<Platform>,
    pub output_dir: PathBuf,
    pub filename: Option<String>,
    pub temp_dir: Option<PathBuf>,
}

/// Build lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// A build was submitted and passed the lock check
    Started {
        build_id: Uuid,
        request: BuildRequestInfo,
    },

    /// The state machine moved to a new stage
    StageChanged { build_id: Uuid, stage: BuildStage },

    /// A compile step ran both of its phases
    StepCompleted {
        build_id: Uuid,
        step: String,
        priority: i32,
    },

    /// Terminal notification, carries the same result the caller receives
    Finished {
        build_id: Uuid,
        result: BuildResult,
        duration: Duration,
    },
}
