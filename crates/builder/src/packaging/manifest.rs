//! Bundle manifest: stable logical names for the packaged artifacts

use avbuild_types::Platform;
use avbuild_workspace::AssetId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical name of the primary artifact
pub const PRIMARY_ADDRESS: &str = "Avatar";

/// Name of the manifest entry inside a bundle
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Logical name consumers look the artifact up by
    pub address: String,
    pub asset_id: AssetId,
    /// Entry name inside the bundle
    pub file_name: String,
    pub size: u64,
    /// BLAKE3 of the artifact contents, hex
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle_name: String,
    pub platform: Platform,
    pub created_at: DateTime<Utc>,
    pub assets: Vec<ManifestEntry>,
}

impl BundleManifest {
    #[must_use]
    pub fn entry(&self, address: &str) -> Option<&ManifestEntry> {
        self.assets.iter().find(|entry| entry.address == address)
    }

    #[must_use]
    pub fn primary(&self) -> Option<&ManifestEntry> {
        self.entry(PRIMARY_ADDRESS)
    }

    /// Usable as a build result: names a primary artifact
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.primary().is_some()
    }
}
