//! Structured outcome of one build invocation

use crate::BuildStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Exactly one of these is returned per build call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildResult {
    Success { output_path: PathBuf },
    Failed { kind: BuildStatus, message: String },
}

impl BuildResult {
    #[must_use]
    pub fn success(output_path: impl Into<PathBuf>) -> Self {
        Self::Success {
            output_path: output_path.into(),
        }
    }

    /// Failure of a specific kind. `kind` is widened with the generic bit so
    /// an empty flag set can never masquerade as success.
    #[must_use]
    pub fn failed(kind: BuildStatus, message: impl Into<String>) -> Self {
        Self::Failed {
            kind: kind | BuildStatus::FAILED,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> BuildStatus {
        match self {
            Self::Success { .. } => BuildStatus::SUCCESS,
            Self::Failed { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status().is_failed()
    }

    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output_path } => Some(output_path),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { message, .. } => Some(message),
        }
    }
}
