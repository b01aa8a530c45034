//! Project domain types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A software project owning a set of jobs
///
/// Structure shared between store (persists) and runner (executes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// Ordered job sequence executed front to back. Execution stops at
    /// the first stage whose run is not successful.
    pub pipeline: Vec<u64>,
    /// Jobs runnable standalone, outside the pipeline.
    pub one_off_jobs: HashSet<u64>,
}
