//! Build pipeline error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    #[error("build failed: {message}")]
    Failed { message: String },

    #[error("subject is not packageable: {message}")]
    InvalidSubject { message: String },

    #[error("failed to prepare temporary directory {path}: {message}")]
    TempDirFailed { path: String, message: String },

    #[error("compile step {step} failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("Script removal failed:\n\t{messages}")]
    RemovalFailed { messages: String },

    #[error("missing behaviours remain after cleanup:\n{offenders}")]
    MissingBehaviors { offenders: String },

    #[error("no target platform could be resolved")]
    InvalidTarget,

    #[error("target platform {platform} is not supported")]
    UnsupportedTarget { platform: String },

    #[error("build cancelled")]
    Cancelled,

    #[error("build panicked: {message}")]
    Panicked { message: String },
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidSubject { .. } => {
                Some("Open the scene and make sure the subject node exists and is active.")
            }
            Self::TempDirFailed { .. } => {
                Some("Close any program holding files in the temp directory and retry.")
            }
            Self::MissingBehaviors { .. } => Some(
                "Register the missing behaviour types or remove them from the scene before building.",
            ),
            Self::InvalidTarget | Self::UnsupportedTarget { .. } => {
                Some("Pass --target with one of the supported platforms.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::TempDirFailed { .. } | Self::Cancelled)
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Failed { .. } => "build.failed",
            Self::InvalidSubject { .. } => "build.invalid_subject",
            Self::TempDirFailed { .. } => "build.temp_dir_failed",
            Self::StepFailed { .. } => "build.step_failed",
            Self::RemovalFailed { .. } => "build.removal_failed",
            Self::MissingBehaviors { .. } => "build.missing_behaviors",
            Self::InvalidTarget => "build.invalid_target",
            Self::UnsupportedTarget { .. } => "build.unsupported_target",
            Self::Cancelled => "build.cancelled",
            Self::Panicked { .. } => "build.panicked",
        };
        Some(code)
    }
}
