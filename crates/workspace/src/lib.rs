#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Document workspace for avbuild
//!
//! A [`Workspace`] is rooted at a directory and keeps an arena of scene
//! documents, the ordered list of open ones (their "layout"), and an index
//! giving every file under the root a stable [`AssetId`]. The
//! [`WorkspaceGuard`] snapshots and restores the layout around a build.

pub mod assets;
pub mod document;
pub mod guard;
pub mod layout;
pub mod workspace;

pub use assets::{AssetId, AssetIndex};
pub use document::{Document, DocumentHandle, DOCUMENT_EXTENSION};
pub use guard::{WorkspaceGuard, WorkspaceSnapshot};
pub use layout::{LayoutEntry, WorkspaceLayout};
pub use workspace::{SharedWorkspace, Workspace};
