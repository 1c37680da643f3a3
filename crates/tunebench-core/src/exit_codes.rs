//! Exit code classification for mutating commands

use serde::{Deserialize, Serialize};

/// How a mutating command's exit code is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// The mutation was applied
    Changed,
    /// The target was already in the desired state
    Unchanged,
    Failed,
}

/// Exit codes meaning "applied" and "already satisfied".
///
/// Everything else is a failure. `ethtool -G` exits 80 when the requested
/// ring sizes are already set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCodeTable {
    #[serde(default = "default_changed")]
    pub changed: Vec<i32>,
    #[serde(default = "default_unchanged")]
    pub unchanged: Vec<i32>,
}

fn default_changed() -> Vec<i32> {
    vec![0]
}

fn default_unchanged() -> Vec<i32> {
    vec![80]
}

impl Default for ExitCodeTable {
    fn default() -> Self {
        Self {
            changed: default_changed(),
            unchanged: default_unchanged(),
        }
    }
}

impl ExitCodeTable {
    #[must_use]
    pub fn classify(&self, status: i32) -> ExitClass {
        if self.changed.contains(&status) {
            ExitClass::Changed
        } else if self.unchanged.contains(&status) {
            ExitClass::Unchanged
        } else {
            ExitClass::Failed
        }
    }
}
