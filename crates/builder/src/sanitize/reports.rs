//! Findings collected by the sanitizer passes

use std::fmt::{self, Write};

/// A tombstone still attached after cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offender {
    /// Slash separated path of the carrying node
    pub node: String,
    pub index: usize,
    pub type_name: String,
}

impl fmt::Display for Offender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GameObject '{}' at component index {}",
            self.node, self.index
        )
    }
}

#[derive(Default, Debug)]
pub struct SanitizeReport {
    /// `node: type` for every tombstone removed by the regular sweep
    pub removed: Vec<String>,
    /// Same, for tombstones only the forced pass could remove
    pub forced: Vec<String>,
    pub offenders: Vec<Offender>,
}

impl SanitizeReport {
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.offenders.is_empty()
    }

    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.removed.len() + self.forced.len()
    }

    pub fn absorb(&mut self, other: Self) {
        self.removed.extend(other.removed);
        self.forced.extend(other.forced);
        self.offenders.extend(other.offenders);
    }

    /// Human readable summary under `title`
    #[must_use]
    pub fn render(&self, title: &str) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "{title}:");
        for offender in &self.offenders {
            let _ = writeln!(s, "  {offender}");
        }
        for removed in &self.removed {
            let _ = writeln!(s, "  (removed) {removed}");
        }
        for forced in &self.forced {
            let _ = writeln!(s, "  (forced) {forced}");
        }
        s
    }
}
