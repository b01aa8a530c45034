//! Store trait
//!
//! The persistence capability consumed by the runner. All methods are
//! async so implementations are free to sit on a database or network
//! backend; the runner only ever sees `Arc<dyn Store>`.

use async_trait::async_trait;
use capstan_core::domain::job::Job;
use capstan_core::domain::project::Project;
use capstan_core::domain::run::Run;
use capstan_core::dto::{NewJob, NewProject};

use crate::error::Result;

/// Persistence for projects, jobs, and run histories
///
/// Implementations must tolerate concurrent reads while executions
/// mutate run state: reads observe a consistent snapshot, and writes to
/// distinct jobs do not block each other beyond brief internal locking.
#[async_trait]
pub trait Store: Send + Sync {
    /// Lists all projects
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Fetches a project by ID
    async fn get_project(&self, id: u64) -> Result<Project>;

    /// Creates a project, assigning its ID
    async fn create_project(&self, req: NewProject) -> Result<Project>;

    /// Replaces a stored project with the given one, matched by ID
    async fn update_project(&self, project: Project) -> Result<()>;

    /// Deletes a project by ID
    async fn delete_project(&self, id: u64) -> Result<()>;

    /// Lists all jobs
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Fetches a job by ID
    async fn get_job(&self, id: u64) -> Result<Job>;

    /// Creates a job, assigning its ID and initializing an empty run
    /// history for it
    async fn create_job(&self, req: NewJob) -> Result<Job>;

    /// Replaces a stored job with the given one, matched by ID
    async fn update_job(&self, job: Job) -> Result<()>;

    /// Deletes a job and its run history
    async fn delete_job(&self, id: u64) -> Result<()>;

    /// Fetches one run of a job by its 1-based sequential run ID
    async fn get_run(&self, job_id: u64, run_id: u64) -> Result<Run>;

    /// Returns the most recent runs of a job, newest first
    ///
    /// At most `n` runs are returned; fewer when the history is shorter.
    async fn recent_runs(&self, job_id: u64, n: usize) -> Result<Vec<Run>>;

    /// Allocates the next run slot for a job
    ///
    /// Assigns the next sequential run ID (starting at 1) and stamps the
    /// start time. The returned run is not yet completed; the runner
    /// fills it in and hands it back via [`Store::finalize_run`].
    async fn allocate_run(&self, job_id: u64) -> Result<Run>;

    /// Writes a completed run back to its allocated slot
    async fn finalize_run(&self, job_id: u64, run: Run) -> Result<()>;
}
