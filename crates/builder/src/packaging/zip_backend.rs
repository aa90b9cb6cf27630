//! Deflate zip bundles, the fallback strategy

use std::fs::File;
use std::io::Write;

use async_trait::async_trait;
use avbuild_errors::{Error, PackageError};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::backend::{run_blocking, BundleJob, PackagingBackend};
use super::manifest::{BundleManifest, MANIFEST_FILE};

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipBackend;

#[async_trait]
impl PackagingBackend for ZipBackend {
    fn name(&self) -> &str {
        "zip"
    }

    async fn build_bundle(&self, job: &BundleJob) -> Result<Option<BundleManifest>, Error> {
        job.check_warnings()?;
        let manifest = job.manifest();
        let job = job.clone();
        let written = manifest.clone();
        run_blocking(self.name(), move || {
            job.write_output(|file| write_zip(file, &job, &written))
        })
        .await?;
        Ok(Some(manifest))
    }
}

fn write_zip(file: File, job: &BundleJob, manifest: &BundleManifest) -> Result<File, Error> {
    let failed = |message: String| PackageError::BackendFailed {
        backend: "zip".to_string(),
        message,
    };

    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(job.options.compression.deflate_level()))
        .last_modified_time(zip::DateTime::default());

    let manifest_json =
        serde_json::to_vec_pretty(manifest).map_err(|e| failed(e.to_string()))?;
    writer
        .start_file(MANIFEST_FILE, options)
        .map_err(|e| failed(e.to_string()))?;
    writer.write_all(&manifest_json)?;

    let mut artifacts: Vec<_> = job.artifacts.iter().collect();
    artifacts.sort_by(|a, b| a.entry.file_name.cmp(&b.entry.file_name));
    for artifact in artifacts {
        let data = std::fs::read(&artifact.path)
            .map_err(|e| Error::io_with_path(&e, &artifact.path))?;
        writer
            .start_file(artifact.entry.file_name.as_str(), options)
            .map_err(|e| failed(e.to_string()))?;
        writer.write_all(&data)?;
    }

    let mut file = writer.finish().map_err(|e| failed(e.to_string()))?;
    file.flush()?;
    Ok(file)
}
