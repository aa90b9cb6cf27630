//! Workspace: document arena, open layout and asset index

use std::path::{Path, PathBuf};
use std::sync::Arc;

use avbuild_errors::{Error, UserFacingError, WorkspaceError};
use avbuild_scene::{BehaviorRegistry, SceneGraph, SceneRecord};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::assets::AssetIndex;
use crate::document::{document_path, Document, DocumentHandle, DOCUMENT_EXTENSION};
use crate::layout::{LayoutEntry, WorkspaceLayout};

/// Workspace shared between the caller and a running build
pub type SharedWorkspace = Arc<Mutex<Workspace>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    handle: DocumentHandle,
    window: u32,
}

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    registry: BehaviorRegistry,
    documents: Vec<Document>,
    open: Vec<OpenEntry>,
    active: Option<DocumentHandle>,
    assets: AssetIndex,
}

impl Workspace {
    /// Open a workspace rooted at an existing directory and index its files
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::RootNotFound` if `root` is not a directory.
    pub async fn load(root: impl Into<PathBuf>, registry: BehaviorRegistry) -> Result<Self, Error> {
        let root = root.into();
        let is_dir = fs::metadata(&root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(WorkspaceError::RootNotFound {
                path: root.display().to_string(),
            }
            .into());
        }
        let mut workspace = Self {
            assets: AssetIndex::new(root.clone()),
            root,
            registry,
            documents: Vec::new(),
            open: Vec::new(),
            active: None,
        };
        workspace.refresh().await?;
        Ok(workspace)
    }

    #[must_use]
    pub fn into_shared(self) -> SharedWorkspace {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn assets(&self) -> &AssetIndex {
        &self.assets
    }

    #[must_use]
    pub fn document(&self, handle: DocumentHandle) -> Option<&Document> {
        self.documents.get(handle.index())
    }

    pub fn document_mut(&mut self, handle: DocumentHandle) -> Option<&mut Document> {
        self.documents.get_mut(handle.index())
    }

    /// Handle of a known, non-transient document
    #[must_use]
    pub fn find_document(&self, name: &str) -> Option<DocumentHandle> {
        self.documents
            .iter()
            .find(|doc| !doc.transient && doc.name == name)
            .map(|doc| doc.handle)
    }

    /// Names of `*.scene.json` files directly under the root
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed.
    pub async fn document_names(&self) -> Result<Vec<String>, Error> {
        let suffix = format!(".{DOCUMENT_EXTENSION}");
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, &self.root))?
        {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(&suffix)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    #[must_use]
    pub fn is_open(&self, handle: DocumentHandle) -> bool {
        self.open.iter().any(|entry| entry.handle == handle)
    }

    #[must_use]
    pub fn active(&self) -> Option<DocumentHandle> {
        self.active
    }

    /// Number of documents the workspace knows about, open or not
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn register(&mut self, name: String, path: PathBuf, transient: bool) -> DocumentHandle {
        // A closed fork hands its slot to the next one
        if transient {
            let open = &self.open;
            let reusable = self.documents.iter_mut().find(|doc| {
                doc.transient
                    && !doc.is_loaded()
                    && !open.iter().any(|entry| entry.handle == doc.handle)
            });
            if let Some(doc) = reusable {
                doc.name = name;
                doc.path = path;
                return doc.handle;
            }
        }
        let handle = DocumentHandle(u32::try_from(self.documents.len()).unwrap_or(u32::MAX));
        self.documents.push(Document {
            handle,
            name,
            path,
            graph: None,
            transient,
        });
        handle
    }

    fn push_open(&mut self, handle: DocumentHandle, window: u32) {
        if !self.is_open(handle) {
            self.open.push(OpenEntry { handle, window });
        }
        if self.active.is_none() {
            self.active = Some(handle);
        }
    }

    async fn load_graph(&self, name: &str, path: &Path) -> Result<SceneGraph, Error> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkspaceError::DocumentNotFound {
                    name: name.to_string(),
                }
                .into())
            }
            Err(err) => {
                return Err(WorkspaceError::LoadFailed {
                    path: path.display().to_string(),
                    message: err.to_string(),
                }
                .into())
            }
        };
        let record: SceneRecord =
            serde_json::from_slice(&bytes).map_err(|e| WorkspaceError::LoadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(SceneGraph::from_record(&record, &self.registry)?)
    }

    /// Open `<root>/<name>.scene.json` in `window`, loading it if needed
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::DocumentNotFound` if the file does not exist
    /// and `WorkspaceError::LoadFailed` if it cannot be parsed.
    pub async fn open_document(&mut self, name: &str, window: u32) -> Result<DocumentHandle, Error> {
        let handle = match self.find_document(name) {
            Some(handle) => handle,
            None => {
                let path = document_path(&self.root, name);
                self.register(name.to_string(), path, false)
            }
        };
        let index = handle.index();
        if !self.documents[index].is_loaded() {
            let path = self.documents[index].path.clone();
            let graph = self.load_graph(name, &path).await?;
            self.documents[index].graph = Some(graph);
            debug!(document = name, "loaded document");
        }
        self.push_open(handle, window);
        Ok(handle)
    }

    /// Open a new in-memory document. Nothing is written until the next save.
    pub fn create_document(&mut self, name: &str, graph: SceneGraph, window: u32) -> DocumentHandle {
        let handle = match self.find_document(name) {
            Some(handle) => handle,
            None => {
                let path = document_path(&self.root, name);
                self.register(name.to_string(), path, false)
            }
        };
        self.documents[handle.index()].graph = Some(graph);
        self.push_open(handle, window);
        handle
    }

    /// Open a transient copy of `source` persisted at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if `source` is unknown or not loaded.
    pub fn fork_document(
        &mut self,
        source: DocumentHandle,
        name: impl Into<String>,
        path: PathBuf,
        window: u32,
    ) -> Result<DocumentHandle, Error> {
        let doc = self
            .document(source)
            .ok_or_else(|| WorkspaceError::DocumentNotFound {
                name: source.to_string(),
            })?;
        let graph = doc
            .graph
            .clone()
            .ok_or_else(|| WorkspaceError::DocumentNotLoaded {
                name: doc.name.clone(),
            })?;
        let handle = self.register(name.into(), path, true);
        self.documents[handle.index()].graph = Some(graph);
        self.push_open(handle, window);
        Ok(handle)
    }

    /// Close and unload a document
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::DocumentNotFound` for unknown handles.
    pub fn close_document(&mut self, handle: DocumentHandle) -> Result<(), Error> {
        let doc = self
            .documents
            .get_mut(handle.index())
            .ok_or_else(|| WorkspaceError::DocumentNotFound {
                name: handle.to_string(),
            })?;
        doc.graph = None;
        self.open.retain(|entry| entry.handle != handle);
        if self.active == Some(handle) {
            self.active = self.open.first().map(|entry| entry.handle);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `WorkspaceError::DocumentNotFound` if the document is not open.
    pub fn set_active(&mut self, handle: DocumentHandle) -> Result<(), Error> {
        if !self.is_open(handle) {
            return Err(WorkspaceError::DocumentNotFound {
                name: handle.to_string(),
            }
            .into());
        }
        self.active = Some(handle);
        Ok(())
    }

    /// Current arrangement of open documents
    #[must_use]
    pub fn layout(&self) -> WorkspaceLayout {
        let entries = self
            .open
            .iter()
            .filter_map(|entry| {
                let doc = self.document(entry.handle)?;
                Some(LayoutEntry {
                    handle: entry.handle,
                    name: doc.name.clone(),
                    path: doc.path.clone(),
                    window: entry.window,
                    active: self.active == Some(entry.handle),
                    loaded: doc.is_loaded(),
                })
            })
            .collect();
        WorkspaceLayout { entries }
    }

    /// Re-establish `layout`: close documents it does not list, reopen the
    /// ones it does, then restore order, windows and the active document.
    /// Content already in memory is kept as is.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::RestoreFailed` if a listed document cannot be
    /// reloaded.
    pub async fn restore_layout(&mut self, layout: &WorkspaceLayout) -> Result<(), Error> {
        let current: Vec<DocumentHandle> = self.open.iter().map(|entry| entry.handle).collect();
        for handle in current {
            if !layout.contains(handle) {
                self.close_document(handle)?;
            }
        }

        let mut open = Vec::with_capacity(layout.len());
        for entry in &layout.entries {
            let index = entry.handle.index();
            let Some(doc) = self.documents.get(index) else {
                return Err(WorkspaceError::RestoreFailed {
                    message: format!("unknown document {}", entry.handle),
                }
                .into());
            };
            if entry.loaded && !doc.is_loaded() {
                let graph = self
                    .load_graph(&entry.name, &entry.path)
                    .await
                    .map_err(|e| WorkspaceError::RestoreFailed {
                        message: e.user_message().into_owned(),
                    })?;
                self.documents[index].graph = Some(graph);
            } else if !entry.loaded {
                self.documents[index].graph = None;
            }
            open.push(OpenEntry {
                handle: entry.handle,
                window: entry.window,
            });
        }
        self.open = open;
        self.active = layout.active();
        Ok(())
    }

    /// Persist every loaded open document, returning how many were written
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::PersistFailed` on the first write failure.
    pub async fn save_open_documents(&self) -> Result<usize, Error> {
        let mut written = 0;
        for entry in &self.open {
            let Some(doc) = self.document(entry.handle) else {
                continue;
            };
            let Some(graph) = doc.graph() else {
                continue;
            };
            write_atomically(&doc.path, &graph.to_record()).await?;
            written += 1;
        }
        info!(documents = written, "saved open documents");
        Ok(written)
    }

    /// Rebuild the asset index from disk
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError::IndexFailed` if the root cannot be walked.
    pub async fn refresh(&mut self) -> Result<usize, Error> {
        let mut index = std::mem::take(&mut self.assets);
        let (index, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = index.refresh();
            (index, outcome)
        })
        .await
        .map_err(|e| Error::internal(format!("asset refresh task failed: {e}")))?;
        self.assets = index;
        let count = outcome?;
        debug!(assets = count, "refreshed asset index");
        Ok(count)
    }
}

/// Write JSON next to `path`, then rename over it
async fn write_atomically(path: &Path, record: &SceneRecord) -> Result<(), Error> {
    let persist_err = |message: String| WorkspaceError::PersistFailed {
        path: path.display().to_string(),
        message,
    };
    let bytes = serde_json::to_vec_pretty(record).map_err(|e| persist_err(e.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_err(e.to_string()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &bytes)
        .await
        .map_err(|e| persist_err(e.to_string()))?;
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(persist_err(err.to_string()).into());
    }
    Ok(())
}
