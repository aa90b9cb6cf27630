//! Default artifact file names and per-run temp directories

use std::fmt;
use std::path::{Path, PathBuf};

use avbuild_types::Platform;
use chrono::{DateTime, TimeZone};
use uuid::Uuid;

/// Derives output file names from a scene name, a platform and a clock reading.
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    extension: String,
}

impl ArtifactNamer {
    #[must_use]
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `{yyyy-MM-dd-HHmm}-{scene}-{platform}.{ext}`
    #[must_use]
    pub fn file_name<Tz>(&self, scene: &str, platform: Platform, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        format!(
            "{}-{}-{}.{}",
            at.format("%Y-%m-%d-%H%M"),
            sanitize_scene_name(scene),
            platform.name(),
            self.extension
        )
    }

    /// Fresh, randomly named directory below `temp_root`
    #[must_use]
    pub fn temp_dir(temp_root: &Path) -> PathBuf {
        temp_root.join(Uuid::new_v4().simple().to_string())
    }
}

/// Lowercase, then drop everything outside `[a-z0-9-_]`
#[must_use]
pub fn sanitize_scene_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_'))
        .collect()
}
