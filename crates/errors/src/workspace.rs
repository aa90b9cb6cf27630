//! Workspace and document error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum WorkspaceError {
    #[error("workspace root not found: {path}")]
    RootNotFound { path: String },

    #[error("document not found: {name}")]
    DocumentNotFound { name: String },

    #[error("document is not loaded: {name}")]
    DocumentNotLoaded { name: String },

    #[error("failed to load document {path}: {message}")]
    LoadFailed { path: String, message: String },

    #[error("failed to persist {path}: {message}")]
    PersistFailed { path: String, message: String },

    #[error("failed to index assets under {path}: {message}")]
    IndexFailed { path: String, message: String },

    #[error("failed to restore workspace layout: {message}")]
    RestoreFailed { message: String },
}

impl UserFacingError for WorkspaceError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RootNotFound { .. } => Some("Pass --workspace pointing at an existing directory."),
            Self::DocumentNotFound { .. } => {
                Some("Check the scene name; documents live at <workspace>/<name>.scene.json.")
            }
            Self::PersistFailed { .. } => Some("Ensure the workspace directory is writable."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistFailed { .. } | Self::IndexFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::RootNotFound { .. } => "workspace.root_not_found",
            Self::DocumentNotFound { .. } => "workspace.document_not_found",
            Self::DocumentNotLoaded { .. } => "workspace.document_not_loaded",
            Self::LoadFailed { .. } => "workspace.load_failed",
            Self::PersistFailed { .. } => "workspace.persist_failed",
            Self::IndexFailed { .. } => "workspace.index_failed",
            Self::RestoreFailed { .. } => "workspace.restore_failed",
        };
        Some(code)
    }
}
