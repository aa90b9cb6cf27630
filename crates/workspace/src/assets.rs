//! Stable identities for files under the workspace root

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use avbuild_errors::{Error, WorkspaceError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(Uuid);

impl AssetId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Relative path to id map, rebuilt by [`AssetIndex::refresh`]
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    root: PathBuf,
    entries: BTreeMap<PathBuf, AssetId>,
}

impl AssetIndex {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an absolute or root-relative path
    #[must_use]
    pub fn id_of(&self, path: &Path) -> Option<AssetId> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };
        self.entries.get(relative).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, AssetId)> {
        self.entries.iter().map(|(path, id)| (path.as_path(), *id))
    }

    /// Re-walk the root. Unchanged paths keep their id, new files get a
    /// fresh one and vanished files are dropped.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::IndexFailed` if the root itself cannot be read.
    pub fn refresh(&mut self) -> Result<usize, Error> {
        let mut next = BTreeMap::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(WorkspaceError::IndexFailed {
                        path: self.root.display().to_string(),
                        message: err.to_string(),
                    }
                    .into());
                }
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry during refresh");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_path_buf();
            let id = self.entries.get(&relative).copied().unwrap_or_default();
            next.insert(relative, id);
        }
        self.entries = next;
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_removed_files_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "b").unwrap();

        let mut index = AssetIndex::new(dir.path());
        assert_eq!(index.refresh().unwrap(), 2);
        let a = index.id_of(Path::new("a.txt")).unwrap();
        let b = index.id_of(&dir.path().join("sub/b.txt")).unwrap();
        assert_ne!(a, b);

        std::fs::remove_file(dir.path().join("sub/b.txt")).unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();
        assert_eq!(index.refresh().unwrap(), 2);
        assert_eq!(index.id_of(Path::new("a.txt")), Some(a));
        assert!(index.id_of(Path::new("sub/b.txt")).is_none());
        assert!(index.id_of(Path::new("c.txt")).is_some());
    }

    #[test]
    fn paths_outside_root_have_no_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = AssetIndex::new(dir.path());
        index.refresh().unwrap();
        assert!(index.id_of(Path::new("/elsewhere/file")).is_none());
    }

    #[test]
    fn missing_root_fails() {
        let mut index = AssetIndex::new("/definitely/not/a/workspace");
        assert!(index.refresh().is_err());
    }
}
