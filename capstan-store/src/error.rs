//! Error types for store operations

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when persisting or retrieving entities
#[derive(Debug, Error)]
pub enum StoreError {
    /// No project with the given ID exists
    #[error("project {0} not found")]
    ProjectNotFound(u64),

    /// No job with the given ID exists
    #[error("job {0} not found")]
    JobNotFound(u64),

    /// The job exists but has no run with the given ID
    #[error("run {run_id} for job {job_id} not found")]
    RunNotFound { job_id: u64, run_id: u64 },

    /// The backing storage failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProjectNotFound(_) | Self::JobNotFound(_) | Self::RunNotFound { .. }
        )
    }
}
