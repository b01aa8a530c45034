//! Error types for the runner
//!
//! Command failure (nonzero exit or a shell that won't start) is not an
//! error here: it is recorded on the run itself with `success = false`.
//! These variants cover the setup and persistence phases around an
//! execution, which abort that single request.

use capstan_core::domain::run::Run;
use capstan_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur when scheduling or executing jobs
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The store failed, including lookups of absent projects or jobs
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store could not assign the next run slot for a job
    #[error("cannot allocate run for job {job_id}: {source}")]
    RunAllocation { job_id: u64, source: StoreError },

    /// The job's workspace directory cannot be created or is not a
    /// directory
    #[error("workspace {} is unusable: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The output-capture file could not be set up or read back
    #[error("output capture failed: {0}")]
    CaptureSetup(std::io::Error),

    /// The completed run could not be written back to the store
    ///
    /// Carries the finished run so the caller still observes the result;
    /// durability is not guaranteed.
    #[error("failed to persist run {} for job {job_id}: {source}", .run.id)]
    Persist {
        job_id: u64,
        run: Box<Run>,
        source: StoreError,
    },
}

impl RunnerError {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}
