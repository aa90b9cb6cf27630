//! Build outcome flags and pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

bitflags::bitflags! {
    /// Outcome of a build as a flag set.
    ///
    /// Every failure kind carries the `FAILED` bit, so callers can ask
    /// "did this fail at all" with [`BuildStatus::is_failed`] without
    /// enumerating kinds. The empty set is success.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BuildStatus: u8 {
        /// Generic failure after mutation began; the workspace was rolled back
        const FAILED = 1;
        /// Another build holds the lock
        const ALREADY_BUILDING = 1 | (1 << 1);
        /// Host is compiling its own scripts
        const EDITOR_COMPILING = 1 | (1 << 2);
        /// Host is in an interactive play session
        const EDITOR_PLAYING = 1 | (1 << 3);
        /// No target platform could be resolved
        const INVALID_TARGET = 1 | (1 << 4);
        /// Resolved platform is not in the supported set
        const UNSUPPORTED_TARGET = 1 | (1 << 5);
        /// Subject or its document is not packageable
        const INVALID_GAME_OBJECT = 1 | (1 << 6);
    }
}

impl BuildStatus {
    pub const SUCCESS: Self = Self::empty();

    /// Whether any failure bit is set
    #[must_use]
    pub fn is_failed(self) -> bool {
        self.contains(Self::FAILED)
    }

    /// Whether the build was rejected before any state was touched
    #[must_use]
    pub fn is_rejected_before_mutation(self) -> bool {
        self.is_failed() && self != Self::FAILED
    }

    /// Human readable name of the most specific kind
    #[must_use]
    pub fn kind_name(self) -> &'static str {
        if self.is_empty() {
            "success"
        } else if self == Self::ALREADY_BUILDING {
            "already_building"
        } else if self == Self::EDITOR_COMPILING {
            "editor_compiling"
        } else if self == Self::EDITOR_PLAYING {
            "editor_playing"
        } else if self == Self::INVALID_TARGET {
            "invalid_target"
        } else if self == Self::UNSUPPORTED_TARGET {
            "unsupported_target"
        } else if self == Self::INVALID_GAME_OBJECT {
            "invalid_game_object"
        } else {
            "failed"
        }
    }
}

impl Default for BuildStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

// Manual serde implementation for bitflags
impl Serialize for BuildStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for BuildStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Self::from_bits(bits).ok_or_else(|| {
            serde::de::Error::custom(format!("Invalid BuildStatus bits: {bits}"))
        })
    }
}

/// Pipeline state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BuildStage {
    #[default]
    Idle,
    Validating,
    Preparing,
    Compiling,
    Processing,
    Packaging,
    Completed,
    Failed,
}

impl BuildStage {
    /// Whether the pipeline has touched workspace state in this stage
    #[must_use]
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Compiling | Self::Processing | Self::Packaging
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Inverse of `stage as u8`; unknown values map to `Idle`
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Validating,
            2 => Self::Preparing,
            3 => Self::Compiling,
            4 => Self::Processing,
            5 => Self::Packaging,
            6 => Self::Completed,
            7 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Preparing => "preparing",
            Self::Compiling => "compiling",
            Self::Processing => "processing",
            Self::Packaging => "packaging",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_kind_carries_failed_bit() {
        for kind in [
            BuildStatus::FAILED,
            BuildStatus::ALREADY_BUILDING,
            BuildStatus::EDITOR_COMPILING,
            BuildStatus::EDITOR_PLAYING,
            BuildStatus::INVALID_TARGET,
            BuildStatus::UNSUPPORTED_TARGET,
            BuildStatus::INVALID_GAME_OBJECT,
        ] {
            assert!(kind.is_failed(), "{kind}");
        }
        assert!(!BuildStatus::SUCCESS.is_failed());
    }

    #[test]
    fn kinds_are_distinguishable() {
        assert_ne!(BuildStatus::ALREADY_BUILDING, BuildStatus::FAILED);
        assert_eq!(BuildStatus::ALREADY_BUILDING.kind_name(), "already_building");
        assert_eq!(BuildStatus::FAILED.kind_name(), "failed");
        assert!(BuildStatus::EDITOR_PLAYING.is_rejected_before_mutation());
        assert!(!BuildStatus::FAILED.is_rejected_before_mutation());
    }

    #[test]
    fn serde_round_trips_bits() {
        let json = serde_json::to_string(&BuildStatus::UNSUPPORTED_TARGET).unwrap();
        assert_eq!(json, "33");
        let back: BuildStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BuildStatus::UNSUPPORTED_TARGET);
    }

    #[test]
    fn mutating_stages() {
        assert!(!BuildStage::Validating.is_mutating());
        assert!(BuildStage::Compiling.is_mutating());
        assert!(BuildStage::Failed.is_terminal());
    }

    #[test]
    fn stage_survives_u8_conversion() {
        for stage in [
            BuildStage::Idle,
            BuildStage::Validating,
            BuildStage::Preparing,
            BuildStage::Compiling,
            BuildStage::Processing,
            BuildStage::Packaging,
            BuildStage::Completed,
            BuildStage::Failed,
        ] {
            assert_eq!(BuildStage::from_u8(stage as u8), stage);
        }
        assert_eq!(BuildStage::from_u8(200), BuildStage::Idle);
    }
}
