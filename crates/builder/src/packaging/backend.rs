//! Packaging strategies and the job handed to them

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use avbuild_errors::{Error, PackageError};
use avbuild_types::Platform;
use chrono::Utc;
use tracing::{debug, warn};

use super::archive::ArchiveBackend;
use super::manifest::{BundleManifest, ManifestEntry};
use super::zip_backend::ZipBackend;
use crate::request::BundleOptions;

const PARTIAL_SUFFIX: &str = ".partial";

/// A serialized artifact ready to be bundled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub entry: ManifestEntry,
}

/// Everything a backend needs to produce one bundle file
#[derive(Debug, Clone)]
pub struct BundleJob {
    pub bundle_name: String,
    pub platform: Platform,
    pub artifacts: Vec<Artifact>,
    pub output_path: PathBuf,
    pub options: BundleOptions,
}

impl BundleJob {
    #[must_use]
    pub fn manifest(&self) -> BundleManifest {
        BundleManifest {
            bundle_name: self.bundle_name.clone(),
            platform: self.platform,
            created_at: Utc::now(),
            assets: self.artifacts.iter().map(|a| a.entry.clone()).collect(),
        }
    }

    /// Packaging warnings for this job
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for artifact in &self.artifacts {
            if artifact.entry.size == 0 {
                warnings.push(format!("{} is empty", artifact.entry.file_name));
            }
            if !seen.insert(artifact.entry.address.as_str()) {
                warnings.push(format!("duplicate address {}", artifact.entry.address));
            }
        }
        warnings
    }

    /// Any packaging warning is fatal
    ///
    /// # Errors
    ///
    /// Returns `PackageError::StrictViolation` listing the warnings.
    pub fn check_warnings(&self) -> Result<(), Error> {
        let warnings = self.warnings();
        if warnings.is_empty() {
            return Ok(());
        }
        Err(PackageError::StrictViolation {
            message: warnings.join("; "),
        }
        .into())
    }

    /// `<output>.partial`, where a backend writes before the bundle is complete
    #[must_use]
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_owned();
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    /// Write the bundle through the partial file and rename it into place
    ///
    /// A stale output is removed first and never reused. On any failure the
    /// partial file is deleted so no truncated bundle is left behind.
    /// Blocking; call from `run_blocking`.
    ///
    /// # Errors
    ///
    /// Returns the writer's error, or an I/O error from removing, creating or
    /// renaming the output.
    pub fn write_output<F>(&self, write: F) -> Result<(), Error>
    where
        F: FnOnce(File) -> Result<File, Error>,
    {
        match std::fs::remove_file(&self.output_path) {
            Ok(()) => debug!(path = %self.output_path.display(), "removed stale bundle"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io_with_path(&e, &self.output_path)),
        }

        let partial = self.partial_path();
        let result = File::create(&partial)
            .map_err(|e| Error::io_with_path(&e, &partial))
            .and_then(write)
            .and_then(|file| file.sync_all().map_err(|e| Error::io_with_path(&e, &partial)))
            .and_then(|()| {
                std::fs::rename(&partial, &self.output_path)
                    .map_err(|e| Error::io_with_path(&e, &self.output_path))
            });
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(&partial) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %e, "failed to remove partial bundle");
                }
            }
        }
        result
    }
}

/// One way of turning artifacts into a bundle file
///
/// `Ok(None)` means the backend ran but produced no manifest; the packager
/// treats it like an error and moves on to the next backend.
#[async_trait]
pub trait PackagingBackend: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Any error makes the packager fall through to the next backend.
    async fn build_bundle(&self, job: &BundleJob) -> Result<Option<BundleManifest>, Error>;
}

/// Construct a built-in backend from its configured name
///
/// # Errors
///
/// Returns `PackageError::UnknownBackend` for unknown names.
pub fn backend_by_name(name: &str) -> Result<Arc<dyn PackagingBackend>, Error> {
    match name {
        "archive" => Ok(Arc::new(ArchiveBackend)),
        "zip" => Ok(Arc::new(ZipBackend)),
        other => Err(PackageError::UnknownBackend {
            name: other.to_string(),
        }
        .into()),
    }
}

/// Construct backends in configured order
///
/// # Errors
///
/// Returns `PackageError::UnknownBackend` for the first unknown name.
pub fn backends_from_names(names: &[String]) -> Result<Vec<Arc<dyn PackagingBackend>>, Error> {
    names.iter().map(|name| backend_by_name(name)).collect()
}

/// Run blocking bundle writing off the async runtime
pub(crate) async fn run_blocking<F>(backend: &str, work: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<(), Error> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PackageError::BackendFailed {
            backend: backend.to_string(),
            message: format!("packaging task failed: {e}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use avbuild_workspace::AssetId;
    use std::io::Write;

    fn artifact(address: &str, size: u64) -> Artifact {
        Artifact {
            path: PathBuf::from(format!("/tmp/{address}.prefab")),
            entry: ManifestEntry {
                address: address.to_string(),
                asset_id: AssetId::new(),
                file_name: format!("{address}.prefab"),
                size,
                blake3: String::new(),
            },
        }
    }

    fn job(artifacts: Vec<Artifact>) -> BundleJob {
        BundleJob {
            bundle_name: "bundle".into(),
            platform: Platform::Linux,
            artifacts,
            output_path: PathBuf::from("/tmp/none.avb"),
            options: BundleOptions::default(),
        }
    }

    #[test]
    fn warnings_are_fatal() {
        let err = job(vec![artifact("Avatar", 0)]).check_warnings().unwrap_err();
        assert!(err.to_string().contains("Avatar.prefab is empty"));
        job(vec![artifact("Avatar", 3)]).check_warnings().unwrap();
    }

    #[test]
    fn duplicate_addresses_warn() {
        let job = job(vec![artifact("Avatar", 1), artifact("Avatar", 1)]);
        assert_eq!(job.warnings(), vec!["duplicate address Avatar".to_string()]);
    }

    #[test]
    fn failed_write_leaves_no_partial_or_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(Vec::new());
        job.output_path = dir.path().join("x.avb");
        std::fs::write(&job.output_path, b"stale").unwrap();

        let err = job
            .write_output(|mut file| {
                file.write_all(b"half a bundle")?;
                Err(Error::internal("writer gave up"))
            })
            .unwrap_err();
        assert!(err.to_string().contains("writer gave up"));
        assert!(!job.output_path.exists());
        assert!(!job.partial_path().exists());
    }

    #[test]
    fn completed_write_is_renamed_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(Vec::new());
        job.output_path = dir.path().join("x.avb");
        std::fs::write(&job.output_path, b"stale").unwrap();

        job.write_output(|mut file| {
            file.write_all(b"fresh")?;
            Ok(file)
        })
        .unwrap();
        assert_eq!(std::fs::read(&job.output_path).unwrap(), b"fresh");
        assert!(!job.partial_path().exists());
        assert_eq!(job.partial_path(), dir.path().join("x.avb.partial"));
    }

    #[test]
    fn unknown_backend_name_is_rejected() {
        assert_eq!(backend_by_name("archive").unwrap().name(), "archive");
        assert_eq!(backend_by_name("zip").unwrap().name(), "zip");
        assert!(backend_by_name("ftp").is_err());
        let names = vec!["zip".to_string(), "archive".to_string()];
        let order: Vec<_> = backends_from_names(&names)
            .unwrap()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(order, names);
    }
}
