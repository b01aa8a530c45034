//! Pipeline controller
//!
//! Runs a project's ordered job sequence through the execution engine,
//! one stage at a time. A stage whose run is not successful stops the
//! pipeline; that is early termination, not an error. Engine errors
//! (setup or persistence failures) abort the pipeline and propagate.

use capstan_store::Store;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::scheduler::Runner;

impl Runner {
    /// Executes a project's pipeline immediately and waits for it
    ///
    /// Takes the project through admission control first, so a
    /// concurrent execution of the same project delays this one instead
    /// of overlapping it.
    pub async fn execute_pipeline(self: &Arc<Self>, project_id: u64) -> Result<()> {
        self.mark_project_running(project_id).await;
        self.run_pipeline(project_id).await
    }

    /// Runs one pipeline and releases its admission state afterwards
    ///
    /// The caller must have marked the project as running. Completion
    /// is signalled on every exit path (normal completion, early stop,
    /// or error) so the queue keeps draining.
    pub(crate) async fn run_pipeline(self: &Arc<Self>, project_id: u64) -> Result<()> {
        let result = self.run_pipeline_inner(project_id).await;
        self.pipeline_done(project_id);
        result
    }

    async fn run_pipeline_inner(self: &Arc<Self>, project_id: u64) -> Result<()> {
        let project = self.store.get_project(project_id).await?;
        let stages = project.pipeline.len();

        for (idx, &job_id) in project.pipeline.iter().enumerate() {
            info!(
                "Executing stage {}/{} of project {}: job {}",
                idx + 1,
                stages,
                project_id,
                job_id
            );

            // Block out one-off scheduling of this job for the duration
            // of the stage; wait if such an execution is in flight.
            self.mark_job_running(job_id).await;
            let run = self.run_job(job_id, true).await?;

            if !run.success {
                info!(
                    "Pipeline of project {} stopped at stage {}/{} (job {} run {} failed)",
                    project_id,
                    idx + 1,
                    stages,
                    job_id,
                    run.id
                );
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use capstan_core::dto::{NewJob, NewProject};
    use capstan_store::MemoryStore;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn runner_with_store() -> (Arc<Runner>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let runner = Runner::new(store.clone(), RunnerConfig::default());
        (runner, store)
    }

    async fn new_job(store: &MemoryStore, cmd: &str, workspace: Option<PathBuf>) -> u64 {
        store
            .create_job(NewJob {
                name: "job".to_string(),
                cmd: cmd.to_string(),
                workspace,
            })
            .await
            .unwrap()
            .id
    }

    async fn new_project(store: &MemoryStore, pipeline: Vec<u64>) -> u64 {
        store
            .create_project(NewProject {
                name: "proj".to_string(),
                pipeline,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_pipeline_short_circuits_on_failure() {
        let (runner, store) = runner_with_store();
        let ws = TempDir::new().unwrap();
        let dir = Some(ws.path().to_path_buf());

        let write = new_job(&store, "echo 'hello' > chain.txt", dir.clone()).await;
        let read = new_job(&store, "cat chain.txt", dir.clone()).await;
        let remove = new_job(&store, "rm chain.txt", dir.clone()).await;
        let read_again = new_job(&store, "cat chain.txt", dir.clone()).await;
        let never = new_job(&store, "echo 'I should not run'", dir).await;

        let project_id =
            new_project(&store, vec![write, read, remove, read_again, never]).await;

        // A failed stage stops the pipeline but is not an error.
        runner.execute_pipeline(project_id).await.unwrap();

        let hello = store.recent_runs(read, 10).await.unwrap().remove(0);
        assert!(hello.success);
        assert_eq!(hello.output, "hello\n");

        let failed = store.recent_runs(read_again, 10).await.unwrap().remove(0);
        assert!(!failed.success);
        assert!(failed.output.ends_with("exit status 1"));

        assert!(store.recent_runs(never, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_pipeline_completes() {
        let (runner, store) = runner_with_store();
        let project_id = new_project(&store, Vec::new()).await;

        runner.execute_pipeline(project_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_project() {
        let (runner, _store) = runner_with_store();
        let err = runner.execute_pipeline(7).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_repeated_job_runs_each_time() {
        let (runner, store) = runner_with_store();
        let job_id = new_job(&store, "echo again", None).await;
        let project_id = new_project(&store, vec![job_id, job_id]).await;

        runner.execute_pipeline(project_id).await.unwrap();

        let runs = store.recent_runs(job_id, 10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_stage_error_aborts_pipeline() {
        let (runner, store) = runner_with_store();
        let first = new_job(&store, "echo first", None).await;
        let missing = new_job(&store, "echo gone", None).await;
        let last = new_job(&store, "echo last", None).await;
        let project_id = new_project(&store, vec![first, missing, last]).await;

        store.delete_job(missing).await.unwrap();

        let err = runner.execute_pipeline(project_id).await.unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(store.recent_runs(first, 10).await.unwrap().len(), 1);
        assert!(store.recent_runs(last, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_runs_stages_in_order() {
        let (runner, store) = runner_with_store();
        let ws = TempDir::new().unwrap();
        let dir = Some(ws.path().to_path_buf());

        let a = new_job(&store, "printf a >> order.txt", dir.clone()).await;
        let b = new_job(&store, "printf b >> order.txt", dir.clone()).await;
        let c = new_job(&store, "printf c >> order.txt", dir.clone()).await;
        let project_id = new_project(&store, vec![a, b, c]).await;

        runner.execute_pipeline(project_id).await.unwrap();

        let order = std::fs::read_to_string(ws.path().join("order.txt")).unwrap();
        assert_eq!(order, "abc");
    }
}
