#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for avbuild
//!
//! Values are layered, lowest precedence first:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/avbuild/config.toml)
//! - Environment variables (`AVBUILD_*`)
//! - CLI flags (applied by the binary)

use avbuild_errors::{ConfigError, Error};
use avbuild_types::{ColorChoice, CompressionLevel, OutputFormat, Platform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Packaging backends the builder knows how to construct
pub const KNOWN_BACKENDS: &[&str] = &["archive", "zip"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub packaging: PackagingConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
    /// Where `--debug` writes its JSON log file
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,
}

/// Build pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Output directory, relative paths resolve against the workspace root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Parent of the per-run random temp directories
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,
    /// Artifact file extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_supported_platforms")]
    pub supported_platforms: Vec<Platform>,
}

/// Packaging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackagingConfig {
    /// Ordered strategy list, tried until one produces a manifest
    #[serde(default = "default_backends")]
    pub backends: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: CompressionLevel,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color_choice(),
            logs_dir: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_root: default_temp_root(),
            extension: default_extension(),
            supported_platforms: default_supported_platforms(),
        }
    }
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            compression: default_compression(),
        }
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Builds")
}

fn default_temp_root() -> PathBuf {
    PathBuf::from("Temp")
}

fn default_extension() -> String {
    "avb".to_string()
}

fn default_supported_platforms() -> Vec<Platform> {
    vec![
        Platform::Windows,
        Platform::Linux,
        Platform::MacOs,
        Platform::Android,
    ]
}

fn default_backends() -> Vec<String> {
    vec!["archive".to_string(), "zip".to_string()]
}

fn default_compression() -> CompressionLevel {
    CompressionLevel::Maximum
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("avbuild").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(output) = std::env::var("AVBUILD_OUTPUT") {
            self.general.default_output =
                output.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "AVBUILD_OUTPUT".to_string(),
                    value: output,
                })?;
        }

        if let Ok(color) = std::env::var("AVBUILD_COLOR") {
            self.general.color = color.parse().map_err(|_| ConfigError::InvalidValue {
                field: "AVBUILD_COLOR".to_string(),
                value: color,
            })?;
        }

        if let Ok(dir) = std::env::var("AVBUILD_OUTPUT_DIR") {
            if dir.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "AVBUILD_OUTPUT_DIR".to_string(),
                    value: dir,
                }
                .into());
            }
            self.build.output_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("AVBUILD_TEMP_ROOT") {
            if dir.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "AVBUILD_TEMP_ROOT".to_string(),
                    value: dir,
                }
                .into());
            }
            self.build.temp_root = PathBuf::from(dir);
        }

        if let Ok(extension) = std::env::var("AVBUILD_EXTENSION") {
            let trimmed = extension.trim_start_matches('.');
            if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::InvalidValue {
                    field: "AVBUILD_EXTENSION".to_string(),
                    value: extension,
                }
                .into());
            }
            self.build.extension = trimmed.to_string();
        }

        if let Ok(compression) = std::env::var("AVBUILD_COMPRESSION") {
            self.packaging.compression =
                compression
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "AVBUILD_COMPRESSION".to_string(),
                        value: compression,
                    })?;
        }

        Ok(())
    }

    /// Check cross-field constraints serde cannot express
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for empty platform or backend lists and
    /// `ConfigError::InvalidValue` for unknown backend names.
    pub fn validate(&self) -> Result<(), Error> {
        if self.build.supported_platforms.is_empty() {
            return Err(ConfigError::Invalid {
                message: "build.supported_platforms must not be empty".to_string(),
            }
            .into());
        }
        if self.packaging.backends.is_empty() {
            return Err(ConfigError::Invalid {
                message: "packaging.backends must list at least one backend".to_string(),
            }
            .into());
        }
        if let Some(unknown) = self
            .packaging
            .backends
            .iter()
            .find(|name| !KNOWN_BACKENDS.contains(&name.as_str()))
        {
            return Err(ConfigError::InvalidValue {
                field: "packaging.backends".to_string(),
                value: unknown.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Output directory resolved against a workspace root
    #[must_use]
    pub fn output_dir_for(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.build.output_dir)
    }

    /// Temp root resolved against a workspace root
    #[must_use]
    pub fn temp_root_for(&self, workspace_root: &Path) -> PathBuf {
        resolve(workspace_root, &self.build.temp_root)
    }

    /// Directory for debug log files
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.general.logs_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("avbuild")
                .join("logs")
        })
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
