//! Job DTOs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request to create a new job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub cmd: String,
    pub workspace: Option<PathBuf>,
}
