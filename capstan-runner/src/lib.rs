//! Capstan Runner
//!
//! Schedules and executes shell-command jobs, optionally grouped into a
//! project's sequentially-ordered pipeline, recording a history of runs
//! through a [`capstan_store::Store`].
//!
//! Architecture:
//! - Configuration: shell interpreter and ambient working directory
//! - Scheduler: admission control, allowing at most one in-flight
//!   execution per job and per project, with a FIFO queue of deferred
//!   requests
//! - Execution engine: spawns one command, captures combined output,
//!   finalizes the run record
//! - Pipeline controller: runs a project's jobs in order and stops at
//!   the first failed stage
//!
//! `schedule_job`/`schedule_project` return without waiting: execution
//! happens on spawned tasks, and completions drain the pending queue.

mod config;
mod error;
mod execution;
mod pipeline;
mod scheduler;

pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use scheduler::Runner;
