//! Admission-control scheduler
//!
//! The runner enforces at most one in-flight execution per job ID and
//! per project ID. A request whose target is already running joins a
//! FIFO queue shared by jobs and projects; completions pop the head and
//! feed it back through the same admission path.
//!
//! All admission state lives in one mutex-guarded struct owned by the
//! [`Runner`] instance. The lock is held only for the brief state
//! transitions (mark running, mark idle, dequeue), never across an
//! execution or an await.

use capstan_store::Store;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::config::RunnerConfig;
use crate::error::Result;

/// A deferred execution request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Job(u64),
    Project(u64),
}

#[derive(Default)]
struct SchedulerState {
    running_jobs: HashSet<u64>,
    running_projects: HashSet<u64>,
    queue: VecDeque<Request>,
}

/// Coordinates and runs jobs and project pipelines
///
/// Holds the store handle, the runner configuration, and the transient
/// admission state. Constructed once and shared as `Arc<Runner>`; the
/// store owns the canonical entities, the runner owns only IDs in
/// flight.
pub struct Runner {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) config: RunnerConfig,
    state: Mutex<SchedulerState>,
    /// Fired on every job/pipeline completion; wakes waiters in
    /// `mark_job_running`/`mark_project_running`.
    completions: Notify,
}

impl Runner {
    /// Creates a new runner using the given store
    pub fn new(store: Arc<dyn Store>, config: RunnerConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            state: Mutex::new(SchedulerState::default()),
            completions: Notify::new(),
        })
    }

    /// Schedules a job
    ///
    /// If the job is not already running it is started immediately on a
    /// spawned task, otherwise the request is queued. Returns without
    /// waiting for execution either way. Fails if the job cannot be
    /// retrieved.
    pub async fn schedule_job(self: &Arc<Self>, job_id: u64) -> Result<()> {
        self.store.get_job(job_id).await?;
        self.admit(Request::Job(job_id));
        Ok(())
    }

    /// Schedules a project pipeline
    ///
    /// If the project is not already running it is started immediately
    /// on a spawned task, otherwise the request is queued. Returns
    /// without waiting for execution either way. Fails if the project
    /// cannot be retrieved.
    pub async fn schedule_project(self: &Arc<Self>, project_id: u64) -> Result<()> {
        self.store.get_project(project_id).await?;
        self.admit(Request::Project(project_id));
        Ok(())
    }

    /// Admits a request: launch now if the target is idle, queue it
    /// otherwise
    ///
    /// Dequeued requests re-enter here, so a target that became busy
    /// again between dequeue and admission is re-queued rather than run
    /// concurrently or dropped.
    fn admit(self: &Arc<Self>, request: Request) {
        let launch = {
            let mut state = self.state.lock().unwrap();
            let idle = match request {
                Request::Job(id) => state.running_jobs.insert(id),
                Request::Project(id) => state.running_projects.insert(id),
            };
            if !idle {
                debug!("Target of {:?} already running, queueing request", request);
                state.queue.push_back(request);
            }
            idle
        };

        if launch {
            self.spawn_execution(request);
        }
    }

    /// Launches a request on its own task
    ///
    /// Errors are logged, not propagated: a queued request's launch is
    /// fire-and-forget and must never block further queue draining.
    fn spawn_execution(self: &Arc<Self>, request: Request) {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            match request {
                Request::Job(id) => {
                    if let Err(e) = runner.run_job(id, false).await {
                        error!("Failed to execute job {}: {:#}", id, e);
                    }
                }
                Request::Project(id) => {
                    if let Err(e) = runner.run_pipeline(id).await {
                        error!("Failed to execute pipeline of project {}: {:#}", id, e);
                    }
                }
            }
        });
    }

    /// Marks a job as running, waiting until no other execution of the
    /// same job is in flight
    ///
    /// The notified future is registered before the state check, so a
    /// completion signalled in between cannot be missed.
    pub(crate) async fn mark_job_running(&self, job_id: u64) {
        loop {
            let notified = self.completions.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().unwrap();
                if state.running_jobs.insert(job_id) {
                    return;
                }
            }
            debug!("Job {} already running, waiting for completion", job_id);
            notified.await;
        }
    }

    /// Marks a project as running, waiting until no other execution of
    /// the same project is in flight
    pub(crate) async fn mark_project_running(&self, project_id: u64) {
        loop {
            let notified = self.completions.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().unwrap();
                if state.running_projects.insert(project_id) {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Releases a job's running-state after an execution finished
    ///
    /// For one-off executions this also drains the next queued request.
    /// Jobs finishing inside a pipeline don't touch the queue; the
    /// pipeline's own completion does.
    pub(crate) fn job_done(self: &Arc<Self>, job_id: u64, in_pipeline: bool) {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.running_jobs.remove(&job_id);
            if in_pipeline {
                None
            } else {
                state.queue.pop_front()
            }
        };

        self.completions.notify_waiters();

        if let Some(request) = next {
            self.admit(request);
        }
    }

    /// Releases a project's running-state after its pipeline finished
    /// and drains the next queued request
    pub(crate) fn pipeline_done(self: &Arc<Self>, project_id: u64) {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.running_projects.remove(&project_id);
            state.queue.pop_front()
        };

        self.completions.notify_waiters();

        if let Some(request) = next {
            self.admit(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_core::domain::run::Run;
    use capstan_core::dto::{NewJob, NewProject};
    use capstan_store::MemoryStore;
    use std::time::Duration;

    fn runner_with_store() -> (Arc<Runner>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let runner = Runner::new(store.clone(), RunnerConfig::default());
        (runner, store)
    }

    async fn new_job(store: &MemoryStore, cmd: &str) -> u64 {
        store
            .create_job(NewJob {
                name: "job".to_string(),
                cmd: cmd.to_string(),
                workspace: None,
            })
            .await
            .unwrap()
            .id
    }

    /// Polls until the job has `expected` completed runs, panicking
    /// after a couple of seconds.
    async fn wait_for_runs(store: &MemoryStore, job_id: u64, expected: usize) -> Vec<Run> {
        for _ in 0..200 {
            let runs = store.recent_runs(job_id, 100).await.unwrap();
            if runs.len() == expected && runs.iter().all(|r| r.completed()) {
                return runs;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {expected} completed run(s) of job {job_id}");
    }

    #[tokio::test]
    async fn test_schedule_unknown_target_fails() {
        let (runner, _store) = runner_with_store();

        assert!(runner.schedule_job(99).await.unwrap_err().is_not_found());
        assert!(
            runner
                .schedule_project(99)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_schedule_job_runs_it() {
        let (runner, store) = runner_with_store();
        let job_id = new_job(&store, "echo scheduled").await;

        runner.schedule_job(job_id).await.unwrap();

        let runs = wait_for_runs(&store, job_id, 1).await;
        assert!(runs[0].success);
        assert_eq!(runs[0].output, "scheduled\n");
    }

    #[tokio::test]
    async fn test_second_request_queued_not_parallel() {
        let (runner, store) = runner_with_store();
        let job_id = new_job(&store, "sleep 0.3").await;

        runner.schedule_job(job_id).await.unwrap();
        runner.schedule_job(job_id).await.unwrap();

        // While the first execution sleeps, only one run exists.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.recent_runs(job_id, 100).await.unwrap().len(), 1);

        // The queued request runs exactly once after the first finishes,
        // never overlapping it.
        let runs = wait_for_runs(&store, job_id, 2).await;
        assert_eq!(runs[0].id, 2);
        assert_eq!(runs[1].id, 1);
        assert!(runs[0].start >= runs[1].end.unwrap());
    }

    #[tokio::test]
    async fn test_queued_requests_drain_in_order() {
        let (runner, store) = runner_with_store();
        let job_id = new_job(&store, "sleep 0.2").await;

        for _ in 0..3 {
            runner.schedule_job(job_id).await.unwrap();
        }

        let runs = wait_for_runs(&store, job_id, 3).await;
        // Newest first (3, 2, 1) and strictly sequential in time.
        assert_eq!(
            runs.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
        for pair in runs.windows(2) {
            assert!(pair[0].start >= pair[1].end.unwrap());
        }
    }

    #[tokio::test]
    async fn test_distinct_jobs_run_concurrently() {
        let (runner, store) = runner_with_store();
        let first = new_job(&store, "sleep 0.4").await;
        let second = new_job(&store, "sleep 0.4").await;

        runner.schedule_job(first).await.unwrap();
        runner.schedule_job(second).await.unwrap();

        let first_run = wait_for_runs(&store, first, 1).await.remove(0);
        let second_run = wait_for_runs(&store, second, 1).await.remove(0);

        // Execution windows overlap: neither waited for the other.
        assert!(first_run.start < second_run.end.unwrap());
        assert!(second_run.start < first_run.end.unwrap());
    }

    #[tokio::test]
    async fn test_pipeline_blocks_one_off_of_same_job() {
        let (runner, store) = runner_with_store();
        let job_id = new_job(&store, "sleep 0.3").await;
        let project = store
            .create_project(NewProject {
                name: "proj".to_string(),
                pipeline: vec![job_id],
                ..Default::default()
            })
            .await
            .unwrap();

        runner.schedule_project(project.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The pipeline is running this job; the one-off request queues
        // behind it and runs after the pipeline completes.
        runner.schedule_job(job_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.recent_runs(job_id, 100).await.unwrap().len(), 1);

        let runs = wait_for_runs(&store, job_id, 2).await;
        assert!(runs[0].start >= runs[1].end.unwrap());
    }
}
