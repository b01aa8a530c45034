//! In-memory store
//!
//! Keeps all entities in maps behind a single `RwLock` so run-history
//! queries proceed concurrently while executions mutate state. IDs come
//! from monotonic counters and are never reused, even after a delete.

use async_trait::async_trait;
use capstan_core::domain::job::Job;
use capstan_core::domain::project::Project;
use capstan_core::domain::run::Run;
use capstan_core::dto::{NewJob, NewProject};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Default)]
struct Inner {
    projects: HashMap<u64, Project>,
    jobs: HashMap<u64, Job>,
    runs: HashMap<u64, Vec<Run>>,
    next_project_id: u64,
    next_job_id: u64,
}

/// Concurrent in-memory implementation of [`Store`]
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

// Lock poisoning only happens if a writer panicked mid-update; there is
// no sane state to recover, so surface it as a backend failure.
fn poisoned<G>(_: std::sync::PoisonError<G>) -> StoreError {
    StoreError::Backend("store lock poisoned".to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.projects.values().cloned().collect())
    }

    async fn get_project(&self, id: u64) -> Result<Project> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner
            .projects
            .get(&id)
            .cloned()
            .ok_or(StoreError::ProjectNotFound(id))
    }

    async fn create_project(&self, req: NewProject) -> Result<Project> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.next_project_id += 1;
        let project = Project {
            id: inner.next_project_id,
            name: req.name,
            pipeline: req.pipeline,
            one_off_jobs: req.one_off_jobs,
        };
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn update_project(&self, project: Project) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if !inner.projects.contains_key(&project.id) {
            return Err(StoreError::ProjectNotFound(project.id));
        }
        inner.projects.insert(project.id, project);
        Ok(())
    }

    async fn delete_project(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner
            .projects
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::ProjectNotFound(id))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.jobs.values().cloned().collect())
    }

    async fn get_job(&self, id: u64) -> Result<Job> {
        let inner = self.inner.read().map_err(poisoned)?;
        inner
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::JobNotFound(id))
    }

    async fn create_job(&self, req: NewJob) -> Result<Job> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.next_job_id += 1;
        let job = Job {
            id: inner.next_job_id,
            name: req.name,
            cmd: req.cmd,
            workspace: req.workspace,
        };
        inner.jobs.insert(job.id, job.clone());
        inner.runs.insert(job.id, Vec::new());
        Ok(job)
    }

    async fn update_job(&self, job: Job) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if !inner.jobs.contains_key(&job.id) {
            return Err(StoreError::JobNotFound(job.id));
        }
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    async fn delete_job(&self, id: u64) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.jobs.remove(&id).is_none() {
            return Err(StoreError::JobNotFound(id));
        }
        inner.runs.remove(&id);
        Ok(())
    }

    async fn get_run(&self, job_id: u64, run_id: u64) -> Result<Run> {
        let inner = self.inner.read().map_err(poisoned)?;
        let runs = inner
            .runs
            .get(&job_id)
            .ok_or(StoreError::JobNotFound(job_id))?;
        run_id
            .checked_sub(1)
            .and_then(|idx| runs.get(idx as usize))
            .cloned()
            .ok_or(StoreError::RunNotFound { job_id, run_id })
    }

    async fn recent_runs(&self, job_id: u64, n: usize) -> Result<Vec<Run>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let runs = inner
            .runs
            .get(&job_id)
            .ok_or(StoreError::JobNotFound(job_id))?;
        Ok(runs.iter().rev().take(n).cloned().collect())
    }

    async fn allocate_run(&self, job_id: u64) -> Result<Run> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if !inner.jobs.contains_key(&job_id) {
            return Err(StoreError::JobNotFound(job_id));
        }
        let runs = inner.runs.entry(job_id).or_default();
        let run = Run {
            id: runs.len() as u64 + 1,
            start: chrono::Utc::now(),
            end: None,
            cmd: String::new(),
            output: String::new(),
            success: false,
            canceled: false,
        };
        runs.push(run.clone());
        Ok(run)
    }

    async fn finalize_run(&self, job_id: u64, run: Run) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if !inner.jobs.contains_key(&job_id) {
            return Err(StoreError::JobNotFound(job_id));
        }
        let run_id = run.id;
        let slot = inner
            .runs
            .get_mut(&job_id)
            .and_then(|runs| run_id.checked_sub(1).and_then(|idx| runs.get_mut(idx as usize)));
        match slot {
            Some(stored) => {
                *stored = run;
                Ok(())
            }
            None => Err(StoreError::RunNotFound { job_id, run_id }),
        }
    }
}
