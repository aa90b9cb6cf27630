//! Build request and coordinator settings

use std::fmt;
use std::path::{Path, PathBuf};

use avbuild_config::Config;
use avbuild_events::{BuildRequestInfo, ProgressSink};
use avbuild_types::{CompressionLevel, Platform};

/// Which node of which document to package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRef {
    /// Document name, `<root>/<document>.scene.json`
    pub document: String,
    /// Slash separated path from a root node, e.g. `Root/Avatar`
    pub node: String,
}

impl SubjectRef {
    pub fn new(document: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            node: node.into(),
        }
    }
}

/// Caller owned description of one build
///
/// The pipeline only fills in `filename` and `temp_dir` when they are empty
/// and `target` when it is `None`.
#[derive(Clone)]
pub struct BuildRequest {
    pub subject: SubjectRef,
    /// `None` resolves to the host's current platform
    pub target: Option<Platform>,
    pub output_dir: PathBuf,
    pub filename: Option<String>,
    pub temp_dir: Option<PathBuf>,
    pub progress: Option<ProgressSink>,
}

impl BuildRequest {
    pub fn new(subject: SubjectRef, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            subject,
            target: None,
            output_dir: output_dir.into(),
            filename: None,
            temp_dir: None,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: Platform) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Event payload view of this request
    #[must_use]
    pub fn info(&self) -> BuildRequestInfo {
        BuildRequestInfo {
            document: self.subject.document.clone(),
            subject: self.subject.node.clone(),
            target: self.target,
            output_dir: self.output_dir.clone(),
            filename: self.filename.clone(),
            temp_dir: self.temp_dir.clone(),
        }
    }
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("subject", &self.subject)
            .field("target", &self.target)
            .field("output_dir", &self.output_dir)
            .field("filename", &self.filename)
            .field("temp_dir", &self.temp_dir)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Option set handed to every packaging backend
///
/// Backends always rebuild (an existing output is never reused) and always
/// treat packaging warnings as fatal; only the compression level varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleOptions {
    pub compression: CompressionLevel,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            compression: CompressionLevel::Maximum,
        }
    }
}

/// Coordinator settings resolved against a workspace root
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Parent of the random per-run temp directories
    pub temp_root: PathBuf,
    pub extension: String,
    pub supported_platforms: Vec<Platform>,
    /// Backend names, in the order they are tried
    pub backends: Vec<String>,
    pub bundle: BundleOptions,
}

impl BuildSettings {
    #[must_use]
    pub fn from_config(config: &Config, workspace_root: &Path) -> Self {
        Self {
            temp_root: config.temp_root_for(workspace_root),
            extension: config.build.extension.clone(),
            supported_platforms: config.build.supported_platforms.clone(),
            backends: config.packaging.backends.clone(),
            bundle: BundleOptions {
                compression: config.packaging.compression,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_resolve_relative_paths_against_root() {
        let config = Config::default();
        let settings = BuildSettings::from_config(&config, Path::new("/work"));
        assert_eq!(settings.temp_root, PathBuf::from("/work/Temp"));
        assert_eq!(settings.extension, "avb");
        assert_eq!(settings.backends, vec!["archive", "zip"]);
        assert_eq!(settings.bundle, BundleOptions::default());
    }

    #[test]
    fn info_mirrors_request_fields() {
        let request = BuildRequest::new(SubjectRef::new("Main", "Root/Avatar"), "/out")
            .with_target(Platform::Linux)
            .with_filename("a.avb");
        let info = request.info();
        assert_eq!(info.document, "Main");
        assert_eq!(info.subject, "Root/Avatar");
        assert_eq!(info.target, Some(Platform::Linux));
        assert_eq!(info.filename.as_deref(), Some("a.avb"));
        assert_eq!(info.temp_dir, None);
    }
}
