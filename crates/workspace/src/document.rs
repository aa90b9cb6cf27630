//! Scene documents and their handles

use std::fmt;
use std::path::{Path, PathBuf};

use avbuild_scene::SceneGraph;
use serde::{Deserialize, Serialize};

/// File suffix of persisted scene documents
pub const DOCUMENT_EXTENSION: &str = "scene.json";

/// Stable index of a document in its workspace arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentHandle(pub(crate) u32);

impl DocumentHandle {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) handle: DocumentHandle,
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    /// `None` while unloaded
    pub(crate) graph: Option<SceneGraph>,
    /// Created by the pipeline; never listed by [`crate::Workspace::document_names`]
    pub(crate) transient: bool,
}

impl Document {
    #[must_use]
    pub fn handle(&self) -> DocumentHandle {
        self.handle
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.graph.is_some()
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    #[must_use]
    pub fn graph(&self) -> Option<&SceneGraph> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut SceneGraph> {
        self.graph.as_mut()
    }
}

/// `<root>/<name>.scene.json`
#[must_use]
pub fn document_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{name}.{DOCUMENT_EXTENSION}"))
}
