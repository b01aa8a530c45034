//! Project DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Request to create a new project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub pipeline: Vec<u64>,
    pub one_off_jobs: HashSet<u64>,
}
