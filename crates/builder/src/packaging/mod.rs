//! Prefab serialization, artifact collection and bundle packaging

pub mod archive;
pub mod backend;
pub mod manifest;
pub mod zip_backend;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use avbuild_errors::{Error, PackageError};
use avbuild_events::{EventEmitter, EventSender, ProgressReporter};
use avbuild_scene::{NodeId, PrefabRecord, SceneGraph};
use avbuild_types::Platform;
use avbuild_workspace::AssetIndex;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use archive::ArchiveBackend;
pub use backend::{backend_by_name, backends_from_names, Artifact, BundleJob, PackagingBackend};
pub use manifest::{BundleManifest, ManifestEntry, MANIFEST_FILE, PRIMARY_ADDRESS};
pub use zip_backend::ZipBackend;

use crate::request::BundleOptions;

/// Intermediate artifact written for the subject
pub const PREFAB_FILE: &str = "Avatar.prefab";

const PREFAB_EXTENSION: &str = "prefab";

/// Written and deleted to prove a directory is writable
const PROBE_FILE: &str = "test.tmp";

/// Progress window covered by the backends
pub const PACKAGING_WINDOW: (f32, f32) = (0.80, 0.95);

/// Serializes the subject and drives the ordered backend list
#[derive(Debug, Clone)]
pub struct Packager {
    backends: Vec<Arc<dyn PackagingBackend>>,
    options: BundleOptions,
    events: Option<EventSender>,
}

impl EventEmitter for Packager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl Packager {
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn PackagingBackend>>, options: BundleOptions) -> Self {
        Self {
            backends,
            options,
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    /// Write the subject subtree to `<temp_dir>/Avatar.prefab`
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NotWritable` if the probe file cannot be
    /// written and `PackageError::SerializeFailed` if the prefab cannot.
    pub async fn serialize_prefab(
        &self,
        graph: &SceneGraph,
        subject: NodeId,
        temp_dir: &Path,
        source_document: &str,
        platform: Platform,
    ) -> Result<PathBuf, Error> {
        let probe = temp_dir.join(PROBE_FILE);
        let not_writable = |e: std::io::Error| PackageError::NotWritable {
            path: temp_dir.display().to_string(),
            message: e.to_string(),
        };
        fs::write(&probe, b"probe").await.map_err(not_writable)?;
        fs::remove_file(&probe).await.map_err(not_writable)?;

        let root = graph.subtree_record(subject)?;
        let record = PrefabRecord {
            name: root.name.clone(),
            source_document: source_document.to_string(),
            platform,
            root,
        };
        let path = temp_dir.join(PREFAB_FILE);
        let serialize_failed = |message: String| PackageError::SerializeFailed {
            path: path.display().to_string(),
            message,
        };
        let bytes =
            serde_json::to_vec_pretty(&record).map_err(|e| serialize_failed(e.to_string()))?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| serialize_failed(e.to_string()))?;
        debug!(path = %path.display(), "serialized prefab");
        Ok(path)
    }

    /// Readable, indexed `*.prefab` files directly inside `temp_dir`
    ///
    /// # Errors
    ///
    /// Returns `PackageError::NoArtifacts` if nothing usable was found.
    pub async fn collect_artifacts(
        &self,
        temp_dir: &Path,
        assets: &AssetIndex,
    ) -> Result<Vec<Artifact>, Error> {
        let mut artifacts = Vec::new();
        let mut dir = fs::read_dir(temp_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, temp_dir))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, temp_dir))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PREFAB_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let file_name = file_name.to_string();
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable artifact");
                    continue;
                }
            };
            let Some(asset_id) = assets.id_of(&path) else {
                self.emit_warning(format!("{} is not in the asset index", path.display()));
                continue;
            };
            let address = if file_name == PREFAB_FILE {
                PRIMARY_ADDRESS.to_string()
            } else {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&file_name)
                    .to_string()
            };
            artifacts.push(Artifact {
                entry: ManifestEntry {
                    address,
                    asset_id,
                    file_name,
                    size: data.len() as u64,
                    blake3: blake3::hash(&data).to_hex().to_string(),
                },
                path,
            });
        }

        if artifacts.is_empty() {
            return Err(PackageError::NoArtifacts {
                dir: temp_dir.display().to_string(),
            }
            .into());
        }
        artifacts.sort_by(|a, b| a.entry.file_name.cmp(&b.entry.file_name));
        Ok(artifacts)
    }

    /// Try each backend in order until one returns a valid manifest
    ///
    /// # Errors
    ///
    /// Returns `PackageError::AllBackendsFailed` with a listing of the output
    /// directory, or `BuildError::Cancelled`.
    pub async fn package(
        &self,
        artifacts: Vec<Artifact>,
        output_dir: &Path,
        filename: &str,
        platform: Platform,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, output_dir))?;
        let output_path = output_dir.join(filename);
        let bundle_name = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string();
        let job = BundleJob {
            bundle_name,
            platform,
            artifacts,
            output_path: output_path.clone(),
            options: self.options,
        };

        let (start, end) = PACKAGING_WINDOW;
        let count = self.backends.len();
        for (index, backend) in self.backends.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(avbuild_errors::BuildError::Cancelled.into());
            }
            let name = backend.name();
            progress.report_within(start, end, index, count, &format!("Packaging ({name})"));
            match backend.build_bundle(&job).await {
                Ok(Some(manifest)) if manifest.is_valid() && output_path.is_file() => {
                    info!(backend = name, path = %output_path.display(), "bundle written");
                    progress.report(end, "Bundle written");
                    return Ok(output_path);
                }
                Ok(Some(_)) => {
                    self.emit_warning(format!("{name} returned an incomplete manifest"));
                }
                Ok(None) => {
                    self.emit_warning(format!("{name} produced no manifest"));
                }
                Err(err) => {
                    warn!(backend = name, error = %err, "packaging backend failed");
                    self.emit_warning_with_context(format!("{name} failed"), err.to_string());
                }
            }
        }

        Err(PackageError::AllBackendsFailed {
            listing: list_dir(output_dir),
        }
        .into())
    }
}

/// Relative paths of every file under `dir`, one per line
fn list_dir(dir: &Path) -> String {
    let files: Vec<String> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.display().to_string())
        })
        .collect();
    if files.is_empty() {
        "(empty)".to_string()
    } else {
        files.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct Refusing {
        calls: AtomicUsize,
        errors: bool,
    }

    #[async_trait]
    impl PackagingBackend for Refusing {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn build_bundle(&self, _job: &BundleJob) -> Result<Option<BundleManifest>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.errors {
                return Err(Error::internal("boom"));
            }
            Ok(None)
        }
    }

    /// Starts writing the bundle, then fails partway through
    #[derive(Debug)]
    struct Truncating;

    #[async_trait]
    impl PackagingBackend for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        async fn build_bundle(&self, job: &BundleJob) -> Result<Option<BundleManifest>, Error> {
            job.write_output(|mut file| {
                std::io::Write::write_all(&mut file, b"PK\x03\x04 truncated")?;
                Err(Error::internal("disk vanished"))
            })?;
            Ok(Some(job.manifest()))
        }
    }

    async fn indexed_prefab() -> (tempfile::TempDir, PathBuf, AssetIndex) {
        let root = tempfile::tempdir().unwrap();
        let temp = root.path().join("Temp").join("run");
        std::fs::create_dir_all(&temp).unwrap();
        let mut graph = SceneGraph::new();
        let subject = graph.add_root("Avatar");
        let packager = Packager::new(Vec::new(), BundleOptions::default());
        packager
            .serialize_prefab(&graph, subject, &temp, "Main", Platform::Windows)
            .await
            .unwrap();
        std::fs::write(temp.join("Avatar.prefab.meta"), b"meta").unwrap();
        let mut assets = AssetIndex::new(root.path());
        assets.refresh().unwrap();
        (root, temp, assets)
    }

    #[tokio::test]
    async fn collects_only_top_level_prefabs() {
        let (_root, temp, assets) = indexed_prefab().await;
        let packager = Packager::new(Vec::new(), BundleOptions::default());
        let artifacts = packager.collect_artifacts(&temp, &assets).await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].entry.address, PRIMARY_ADDRESS);
        assert!(!temp.join(PROBE_FILE).exists());
    }

    #[tokio::test]
    async fn unindexed_artifacts_are_skipped() {
        let (_root, temp, _) = indexed_prefab().await;
        let packager = Packager::new(Vec::new(), BundleOptions::default());
        let err = packager
            .collect_artifacts(&temp, &AssetIndex::new("/elsewhere"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no valid artifacts"));
    }

    #[tokio::test]
    async fn falls_back_to_the_next_backend() {
        let (root, temp, assets) = indexed_prefab().await;
        let first = Arc::new(Refusing {
            errors: true,
            ..Refusing::default()
        });
        let backends: Vec<Arc<dyn PackagingBackend>> = vec![first.clone(), Arc::new(ZipBackend)];
        let packager = Packager::new(backends, BundleOptions::default());
        let artifacts = packager.collect_artifacts(&temp, &assets).await.unwrap();
        let progress = ProgressReporter::new(Uuid::new_v4());
        let out = root.path().join("Builds");
        let path = packager
            .package(artifacts, &out, "x.avb", Platform::Windows, &progress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert!(path.is_file());
        assert!((progress.last() - PACKAGING_WINDOW.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn fallback_after_a_partial_write_produces_a_readable_bundle() {
        let (root, temp, assets) = indexed_prefab().await;
        let backends: Vec<Arc<dyn PackagingBackend>> =
            vec![Arc::new(Truncating), Arc::new(ZipBackend)];
        let packager = Packager::new(backends, BundleOptions::default());
        let artifacts = packager.collect_artifacts(&temp, &assets).await.unwrap();
        let out = root.path().join("Builds");
        let path = packager
            .package(
                artifacts,
                &out,
                "x.avb",
                Platform::Windows,
                &ProgressReporter::new(Uuid::new_v4()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert!(archive.file_names().any(|name| name == MANIFEST_FILE));
        assert!(!out.join("x.avb.partial").exists());
    }

    #[tokio::test]
    async fn artifact_lost_mid_build_never_reports_a_stale_or_partial_bundle() {
        let (root, temp, assets) = indexed_prefab().await;
        let out = root.path().join("Builds");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("x.avb"), b"previous run").unwrap();
        let backends: Vec<Arc<dyn PackagingBackend>> =
            vec![Arc::new(ArchiveBackend), Arc::new(ZipBackend)];
        let packager = Packager::new(backends, BundleOptions::default());
        let artifacts = packager.collect_artifacts(&temp, &assets).await.unwrap();
        std::fs::remove_file(temp.join(PREFAB_FILE)).unwrap();

        let err = packager
            .package(
                artifacts,
                &out,
                "x.avb",
                Platform::Windows,
                &ProgressReporter::new(Uuid::new_v4()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to build bundles with all backends"));
        assert!(!out.join("x.avb").exists());
        assert!(!out.join("x.avb.partial").exists());
    }

    #[tokio::test]
    async fn all_backends_failing_lists_output_dir() {
        let (root, temp, assets) = indexed_prefab().await;
        let out = root.path().join("Builds");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("older.avb"), b"x").unwrap();
        let backends: Vec<Arc<dyn PackagingBackend>> =
            vec![Arc::new(Refusing::default()), Arc::new(Refusing::default())];
        let packager = Packager::new(backends, BundleOptions::default());
        let artifacts = packager.collect_artifacts(&temp, &assets).await.unwrap();
        let err = packager
            .package(
                artifacts,
                &out,
                "x.avb",
                Platform::Linux,
                &ProgressReporter::new(Uuid::new_v4()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to build bundles with all backends"));
        assert!(message.contains("older.avb"));
    }
}
