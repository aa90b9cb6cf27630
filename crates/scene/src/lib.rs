#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Subject object graph for avbuild
//!
//! A scene is an arena of named nodes. Each node carries ordered
//! attachments: either a live [`Behavior`] or a [`MissingBehavior`]
//! tombstone left behind when a saved attachment type could not be
//! resolved at load time. Behaviours opt into the build pipeline through
//! the [`CompileStep`] and [`RemoveOnBuild`] capabilities.

pub mod behavior;
pub mod discover;
pub mod graph;
pub mod record;
pub mod registry;

pub use behavior::{
    Attachment, Behavior, CompileStep, MissingBehavior, RemoveOnBuild, StepContext, StepError,
};
pub use discover::{compile_steps, removal_steps, Discovered};
pub use graph::{Node, NodeId, SceneGraph};
pub use record::{AttachmentRecord, NodeRecord, PrefabRecord, SceneRecord, SCENE_FORMAT_VERSION};
pub use registry::{BehaviorFactory, BehaviorRegistry};
