//! Snapshot of which documents are open and how

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::DocumentHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub handle: DocumentHandle,
    pub name: String,
    pub path: PathBuf,
    pub window: u32,
    pub active: bool,
    pub loaded: bool,
}

/// Ordered open-document list. Structural equality is what rollback restores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceLayout {
    pub entries: Vec<LayoutEntry>,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, handle: DocumentHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    #[must_use]
    pub fn active(&self) -> Option<DocumentHandle> {
        self.entries
            .iter()
            .find(|entry| entry.active)
            .map(|entry| entry.handle)
    }
}
