use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Workspace mutations performed on behalf of a build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkspaceEvent {
    /// Layout captured before the first mutating stage
    SnapshotTaken { open_documents: usize },

    /// Layout re-established after a failure
    Restored { open_documents: usize },

    /// Restoring the layout failed; the original build error is still reported
    RestoreFailed { failure: FailureContext },

    /// Open documents written to disk
    Persisted { documents: usize },

    /// Asset index rebuilt from disk
    Refreshed { assets: usize },

    /// Fresh temporary directory created
    TempDirPrepared { path: PathBuf, replaced_stale: bool },
}
