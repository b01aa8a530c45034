//! Run domain types

use serde::{Deserialize, Serialize};

/// One recorded execution of a job
///
/// Allocated by the store with the next sequential ID (1-based per job)
/// and a `start` timestamp, filled in by the runner, then written back
/// once via the finalizing update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: u64,
    pub start: chrono::DateTime<chrono::Utc>,
    /// Completion time. `None` until the run is finalized.
    pub end: Option<chrono::DateTime<chrono::Utc>>,
    /// Snapshot of the job's command at launch time.
    pub cmd: String,
    /// Combined standard output and standard error, verbatim.
    pub output: String,
    /// True only if the run was not canceled and the command exited 0.
    pub success: bool,
    pub canceled: bool,
}

impl Run {
    /// Whether the run has been finalized.
    pub fn completed(&self) -> bool {
        self.end.is_some()
    }
}
