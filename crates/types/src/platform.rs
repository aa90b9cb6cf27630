//! Target platforms an artifact can be built for

use avbuild_errors::BuildError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Concrete build target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    #[serde(rename = "macos")]
    MacOs,
    Android,
    #[serde(rename = "ios")]
    Ios,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Self::Windows,
        Self::Linux,
        Self::MacOs,
        Self::Android,
        Self::Ios,
    ];

    /// Short lowercase name used in file names and configuration
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Android => "android",
            Self::Ios => "ios",
        }
    }

    /// Platform of the running host, if it is one we know how to target
    #[must_use]
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "android") {
            Some(Self::Android)
        } else if cfg!(target_os = "ios") {
            Some(Self::Ios)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win64" => Ok(Self::Windows),
            "linux" | "linux64" => Ok(Self::Linux),
            "macos" | "osx" => Ok(Self::MacOs),
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            _ => Err(BuildError::UnsupportedTarget {
                platform: s.to_string(),
            }),
        }
    }
}

impl clap::ValueEnum for Platform {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.name()))
    }
}
