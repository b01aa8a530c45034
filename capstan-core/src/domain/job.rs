//! Job domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A job that can be executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    /// The command to run, interpreted by the configured shell.
    pub cmd: String,
    /// Where the command runs. `None` means the runner's ambient
    /// working directory.
    pub workspace: Option<PathBuf>,
}
