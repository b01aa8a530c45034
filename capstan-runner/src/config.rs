//! Runner configuration
//!
//! Defines the configurable parameters for the runner: which shell
//! interprets job commands and where jobs without a workspace run.

use std::path::PathBuf;

const DEFAULT_SHELL: &str = "/bin/sh";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shell used to interpret job commands, invoked as `shell -c cmd`.
    pub shell: String,

    /// Working directory for jobs that don't set a workspace.
    /// `None` means the process working directory at spawn time.
    pub ambient_dir: Option<PathBuf>,
}

impl RunnerConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            ambient_dir: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CAPSTAN_SHELL (optional, default: /bin/sh)
    /// - CAPSTAN_WORKDIR (optional, default: process working directory)
    pub fn from_env() -> anyhow::Result<Self> {
        let shell = std::env::var("CAPSTAN_SHELL").unwrap_or_else(|_| DEFAULT_SHELL.to_string());

        let ambient_dir = std::env::var_os("CAPSTAN_WORKDIR").map(PathBuf::from);

        let config = Self { shell, ambient_dir };
        config.validate()?;
        Ok(config)
    }

    /// Sets the ambient working directory
    pub fn with_ambient_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ambient_dir = Some(dir.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shell.is_empty() {
            anyhow::bail!("shell cannot be empty");
        }

        if let Some(dir) = &self.ambient_dir {
            if dir.as_os_str().is_empty() {
                anyhow::bail!("ambient_dir cannot be an empty path");
            }
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
