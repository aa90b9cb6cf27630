//! Scene graph error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SceneError {
    #[error("node not found: {id}")]
    NodeNotFound { id: usize },

    #[error("node not found by path: {path}")]
    PathNotFound { path: String },

    #[error("attachment index {index} out of range on {node}")]
    AttachmentOutOfRange { node: String, index: usize },

    #[error("scene has no root node")]
    Empty,

    #[error("invalid scene record: {message}")]
    InvalidRecord { message: String },

    #[error("serialization failed: {message}")]
    Serialization { message: String },
}

impl UserFacingError for SceneError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PathNotFound { .. } => {
                Some("Node paths are slash separated from the root, e.g. Root/Avatar.")
            }
            Self::InvalidRecord { .. } => Some("The scene file is damaged; restore it from backup."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NodeNotFound { .. } => "scene.node_not_found",
            Self::PathNotFound { .. } => "scene.path_not_found",
            Self::AttachmentOutOfRange { .. } => "scene.attachment_out_of_range",
            Self::Empty => "scene.empty",
            Self::InvalidRecord { .. } => "scene.invalid_record",
            Self::Serialization { .. } => "scene.serialization",
        };
        Some(code)
    }
}
