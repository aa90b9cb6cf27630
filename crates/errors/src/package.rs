//! Packaging error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PackageError {
    #[error("failed to write intermediate artifact to {path}: {message}")]
    SerializeFailed { path: String, message: String },

    #[error("directory is not writable: {path}: {message}")]
    NotWritable { path: String, message: String },

    #[error("no valid artifacts found in {dir}")]
    NoArtifacts { dir: String },

    #[error("unknown packaging backend: {name}")]
    UnknownBackend { name: String },

    #[error("backend {backend} failed: {message}")]
    BackendFailed { backend: String, message: String },

    #[error("strict mode: {message}")]
    StrictViolation { message: String },

    #[error("Failed to build bundles with all backends. Output directory contents:\n{listing}")]
    AllBackendsFailed { listing: String },
}

impl UserFacingError for PackageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotWritable { .. } | Self::SerializeFailed { .. } => {
                Some("Check permissions on the temp and output directories.")
            }
            Self::UnknownBackend { .. } => {
                Some("Valid packaging backends are \"archive\" and \"zip\".")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::SerializeFailed { .. } => "package.serialize_failed",
            Self::NotWritable { .. } => "package.not_writable",
            Self::NoArtifacts { .. } => "package.no_artifacts",
            Self::UnknownBackend { .. } => "package.unknown_backend",
            Self::BackendFailed { .. } => "package.backend_failed",
            Self::StrictViolation { .. } => "package.strict_violation",
            Self::AllBackendsFailed { .. } => "package.all_backends_failed",
        };
        Some(code)
    }
}
