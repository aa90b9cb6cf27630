//! Deterministic tar + zstd bundles

use std::fs::File;
use std::io::Write;

use async_trait::async_trait;
use avbuild_errors::{Error, PackageError};

use super::backend::{run_blocking, BundleJob, PackagingBackend};
use super::manifest::{BundleManifest, MANIFEST_FILE};

/// Default deterministic timestamp (Unix epoch) for reproducible bundles
const DETERMINISTIC_TIMESTAMP: u64 = 0;

/// Environment variable for `SOURCE_DATE_EPOCH` (standard for reproducible builds)
const SOURCE_DATE_EPOCH_VAR: &str = "SOURCE_DATE_EPOCH";

/// Primary strategy: `manifest.json` followed by every artifact, in a
/// zstd-compressed tar stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBackend;

#[async_trait]
impl PackagingBackend for ArchiveBackend {
    fn name(&self) -> &str {
        "archive"
    }

    async fn build_bundle(&self, job: &BundleJob) -> Result<Option<BundleManifest>, Error> {
        job.check_warnings()?;
        let manifest = job.manifest();
        let job = job.clone();
        let written = manifest.clone();
        let timestamp = get_deterministic_timestamp();
        run_blocking(self.name(), move || {
            job.write_output(|file| write_archive(file, &job, &written, timestamp))
        })
        .await?;
        Ok(Some(manifest))
    }
}

fn write_archive(
    file: File,
    job: &BundleJob,
    manifest: &BundleManifest,
    timestamp: u64,
) -> Result<File, Error> {
    let failed = |message: String| PackageError::BackendFailed {
        backend: "archive".to_string(),
        message,
    };

    let encoder = zstd::stream::write::Encoder::new(file, job.options.compression.zstd_level())?;
    let mut tar_builder = tar::Builder::new(encoder);
    tar_builder.follow_symlinks(false);

    let manifest_json =
        serde_json::to_vec_pretty(manifest).map_err(|e| failed(e.to_string()))?;
    append_entry(&mut tar_builder, MANIFEST_FILE, &manifest_json, timestamp)?;

    let mut artifacts: Vec<_> = job.artifacts.iter().collect();
    artifacts.sort_by(|a, b| a.entry.file_name.cmp(&b.entry.file_name));
    for artifact in artifacts {
        let data = std::fs::read(&artifact.path)
            .map_err(|e| Error::io_with_path(&e, &artifact.path))?;
        append_entry(&mut tar_builder, &artifact.entry.file_name, &data, timestamp)?;
    }

    let encoder = tar_builder.into_inner()?;
    let mut file = encoder.finish()?;
    file.flush()?;
    Ok(file)
}

/// Append a regular file with normalized metadata
fn append_entry<W: Write>(
    tar_builder: &mut tar::Builder<W>,
    name: &str,
    data: &[u8],
    timestamp: u64,
) -> Result<(), Error> {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(timestamp);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root")?;
    header.set_groupname("root")?;
    header.set_cksum();
    tar_builder.append_data(&mut header, name, data)?;
    Ok(())
}

/// Uses `SOURCE_DATE_EPOCH` if set, otherwise the epoch
#[must_use]
pub fn get_deterministic_timestamp() -> u64 {
    std::env::var(SOURCE_DATE_EPOCH_VAR)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(DETERMINISTIC_TIMESTAMP)
}
