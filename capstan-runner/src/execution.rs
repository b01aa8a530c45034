//! Execution engine
//!
//! Runs exactly one job to completion: fetch the job, allocate the next
//! run slot, resolve the workspace, spawn the command through the shell
//! with both output streams captured into a single blob, then finalize
//! and persist the run record.
//!
//! A command that exits nonzero (or a shell that won't start) is not an
//! engine error: the failure description is appended to the captured
//! output and the run is recorded with `success = false`. That recorded
//! failure is what stops a pipeline early.

use capstan_core::domain::job::Job;
use capstan_core::domain::run::Run;
use capstan_store::Store;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::scheduler::Runner;

impl Runner {
    /// Executes a job immediately and waits for it to finish
    ///
    /// Takes the job through admission control first, so a concurrent
    /// execution of the same job delays this one instead of overlapping
    /// it. On success the finalized [`Run`] is returned; it has also
    /// been persisted to the store.
    pub async fn execute_job(self: &Arc<Self>, job_id: u64) -> Result<Run> {
        self.mark_job_running(job_id).await;
        self.run_job(job_id, false).await
    }

    /// Runs one job and releases its admission state afterwards
    ///
    /// The caller must have marked the job as running. Completion is
    /// signalled on every path (success, command failure, or setup
    /// error) so the target is never left permanently blocked.
    pub(crate) async fn run_job(self: &Arc<Self>, job_id: u64, in_pipeline: bool) -> Result<Run> {
        let result = self.run_job_inner(job_id).await;
        self.job_done(job_id, in_pipeline);
        result
    }

    async fn run_job_inner(&self, job_id: u64) -> Result<Run> {
        let job = self.store.get_job(job_id).await?;

        let mut run = self
            .store
            .allocate_run(job_id)
            .await
            .map_err(|source| RunnerError::RunAllocation { job_id, source })?;
        run.cmd = job.cmd.clone();

        debug!("Starting run {} of job {} ({:?})", run.id, job_id, job.cmd);

        let workdir = self.resolve_workspace(&job).await?;

        // One temp file wired to both streams, so stdout and stderr
        // interleave into the same capture the way they would on a
        // terminal.
        let mut capture = tempfile::tempfile().map_err(RunnerError::CaptureSetup)?;
        let out = capture.try_clone().map_err(RunnerError::CaptureSetup)?;
        let err = capture.try_clone().map_err(RunnerError::CaptureSetup)?;

        let mut command = Command::new(&self.config.shell);
        command
            .arg("-c")
            .arg(&job.cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err));
        if let Some(dir) = &workdir {
            // Explicit per-spawn directory; the process-wide working
            // directory is never touched.
            command.current_dir(dir);
        }

        let failure = match command.status().await {
            Ok(status) if status.success() => None,
            Ok(status) => Some(describe_exit(status)),
            Err(e) => Some(format!("failed to start {}: {}", self.config.shell, e)),
        };

        let mut bytes = Vec::new();
        capture
            .seek(SeekFrom::Start(0))
            .and_then(|_| capture.read_to_end(&mut bytes))
            .map_err(RunnerError::CaptureSetup)?;
        let mut output = String::from_utf8_lossy(&bytes).into_owned();

        if let Some(description) = &failure {
            output.push_str(description);
            warn!("Run {} of job {} failed: {}", run.id, job_id, description);
        }

        run.success = failure.is_none() && !run.canceled;
        run.end = Some(chrono::Utc::now());
        run.output = output;

        if let Err(source) = self.store.finalize_run(job_id, run.clone()).await {
            return Err(RunnerError::Persist {
                job_id,
                run: Box::new(run),
                source,
            });
        }

        info!(
            "Run {} of job {} completed with status: {}",
            run.id,
            job_id,
            if run.success { "success" } else { "failure" }
        );

        Ok(run)
    }

    /// Resolves the directory the command runs in
    ///
    /// A job workspace is created if absent; jobs without one use the
    /// configured ambient directory, or inherit the process working
    /// directory when that is unset too.
    async fn resolve_workspace(&self, job: &Job) -> Result<Option<PathBuf>> {
        match &job.workspace {
            Some(path) => {
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|source| RunnerError::Workspace {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Some(path.clone()))
            }
            None => Ok(self.config.ambient_dir.clone()),
        }
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}
