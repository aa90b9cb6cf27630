//! Snapshot and rollback of the workspace layout around a build

use std::path::Path;

use avbuild_errors::{BuildError, Error, UserFacingError};
use avbuild_events::{EventEmitter, EventSender, FailureContext, WorkspaceEvent};
use tokio::fs;
use tracing::{debug, warn};

use crate::layout::WorkspaceLayout;
use crate::workspace::Workspace;

/// Layout captured before the first mutating stage
///
/// Not `Clone`: a snapshot is consumed by exactly one restore or discard.
#[derive(Debug)]
pub struct WorkspaceSnapshot {
    layout: WorkspaceLayout,
}

impl WorkspaceSnapshot {
    #[must_use]
    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Drop the snapshot after a successful build
    pub fn discard(self) {
        debug!(open_documents = self.layout.len(), "discarded workspace snapshot");
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceGuard {
    events: Option<EventSender>,
}

impl EventEmitter for WorkspaceGuard {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl WorkspaceGuard {
    #[must_use]
    pub fn new(events: Option<EventSender>) -> Self {
        Self { events }
    }

    #[must_use]
    pub fn snapshot(&self, workspace: &Workspace) -> WorkspaceSnapshot {
        let layout = workspace.layout();
        self.emit_workspace(WorkspaceEvent::SnapshotTaken {
            open_documents: layout.len(),
        });
        WorkspaceSnapshot { layout }
    }

    /// Put the workspace back to the snapshot layout
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::RestoreFailed` if a document cannot be
    /// reopened. A `RestoreFailed` event is emitted as well.
    pub async fn restore(
        &self,
        workspace: &mut Workspace,
        snapshot: WorkspaceSnapshot,
    ) -> Result<(), Error> {
        match workspace.restore_layout(&snapshot.layout).await {
            Ok(()) => {
                self.emit_workspace(WorkspaceEvent::Restored {
                    open_documents: snapshot.layout.len(),
                });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err.user_message(), "workspace restore failed");
                self.emit_workspace(WorkspaceEvent::RestoreFailed {
                    failure: FailureContext::from_error(&err),
                });
                Err(err)
            }
        }
    }

    /// Create `path` empty, deleting a stale copy first.
    /// Returns whether a stale directory was removed.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::TempDirFailed` if the stale directory cannot be
    /// removed or the new one cannot be created.
    pub async fn prepare_temp_dir(&self, path: &Path) -> Result<bool, Error> {
        let temp_err = |err: &std::io::Error| BuildError::TempDirFailed {
            path: path.display().to_string(),
            message: err.to_string(),
        };
        let replaced_stale = fs::try_exists(path).await.unwrap_or(false);
        if replaced_stale {
            fs::remove_dir_all(path).await.map_err(|e| temp_err(&e))?;
        }
        fs::create_dir_all(path).await.map_err(|e| temp_err(&e))?;
        self.emit_workspace(WorkspaceEvent::TempDirPrepared {
            path: path.to_path_buf(),
            replaced_stale,
        });
        Ok(replaced_stale)
    }
}
