//! Outcome of a cleanup run.

use std::process::ExitCode;

use imgreap_retention::ImageId;
use serde::Serialize;

use crate::error::exit;

/// Which mutation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TagRemovalFailed,
    DeletionFailed,
}

/// A single failed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub image_id: ImageId,
    /// The tag involved, for tag removals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub cause: String,
}

/// Counters accumulated by the executor.
///
/// `untagged` counts images that lost some tags; `tags_removed` counts the
/// tags themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub repositories: Vec<String>,
    pub dry_run: bool,
    pub kept: usize,
    pub untagged: usize,
    pub tags_removed: usize,
    pub deleted: usize,
    pub skipped_in_use: usize,
    pub already_removed: usize,
    pub failed: usize,
    /// Mutations attempted (or simulated), one per tag removal or deletion.
    pub actions: usize,
    pub reclaimed_bytes: u64,
    pub failures: Vec<Failure>,
}

impl RunReport {
    pub fn new(repositories: Vec<String>, dry_run: bool) -> Self {
        Self {
            repositories,
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, failure: Failure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// True when mutations were attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.actions > 0 && self.failed == self.actions
    }

    /// Numeric exit status for this outcome.
    pub fn exit_status(&self) -> u8 {
        if self.all_failed() {
            exit::ALL_FAILED
        } else {
            exit::SUCCESS
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
