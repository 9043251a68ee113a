//! Execution context handed to a [`JobHandler`](crate::JobHandler).

use std::sync::Arc;

use gf_core::{JobData, JobId, Result};
use gf_db::{Job, JobStore};
use tokio_util::sync::CancellationToken;

/// A running job as seen by its handler.
///
/// Holds a snapshot of the job record that is refreshed by every
/// [`merge_data`](JobContext::merge_data), so later stages read the values
/// earlier stages wrote.
pub struct JobContext {
    job: Job,
    store: Arc<dyn JobStore>,
    cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(job: Job, store: Arc<dyn JobStore>, cancellation: CancellationToken) -> Self {
        Self {
            job,
            store,
            cancellation,
        }
    }

    pub fn id(&self) -> JobId {
        self.job.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn data(&self) -> &JobData {
        &self.job.data
    }

    /// String value of a data key.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.job.data_str(key)
    }

    /// 1-based number of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.job.attempts_made
    }

    /// Atomically merge `partial` into the persisted job data.
    pub fn merge_data(&mut self, partial: JobData) -> Result<()> {
        self.job = self.store.merge_data(self.job.id, &partial)?;
        Ok(())
    }

    /// Append a message to the job log.
    ///
    /// Best-effort: a store failure is traced and otherwise ignored, so
    /// logging never aborts a stage.
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(job_id = %self.job.id, "{message}");
        if let Err(e) = self.store.append_log(self.job.id, message) {
            tracing::warn!(job_id = %self.job.id, error = %e, "Failed to append job log");
        }
    }

    /// Fires when the engine reclaims the job (watchdog or forced shutdown).
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::JobOptions;
    use gf_db::{init_memory_pool, SqliteJobStore};
    use serde_json::json;

    fn setup() -> (Arc<dyn JobStore>, Job) {
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(init_memory_pool().unwrap()));
        let mut data = JobData::new();
        data.insert("uniqueID".into(), json!("u-1"));
        let job = store.create("t", data, &JobOptions::default()).unwrap();
        (store, job)
    }

    #[test]
    fn merge_refreshes_snapshot() {
        let (store, job) = setup();
        let mut ctx = JobContext::new(job, Arc::clone(&store), CancellationToken::new());

        let mut partial = JobData::new();
        partial.insert("fbxFilePath".into(), json!("/p/u-1/model.fbx"));
        ctx.merge_data(partial).unwrap();

        assert_eq!(ctx.data_str("fbxFilePath"), Some("/p/u-1/model.fbx"));
        assert_eq!(ctx.data_str("uniqueID"), Some("u-1"));
        assert_eq!(
            store.get(ctx.id()).unwrap().data_str("fbxFilePath"),
            Some("/p/u-1/model.fbx")
        );
    }

    #[test]
    fn log_is_best_effort() {
        let (store, job) = setup();
        let ctx = JobContext::new(job, Arc::clone(&store), CancellationToken::new());
        ctx.log("hello");
        store.remove(ctx.id()).unwrap();
        // The job is gone; logging must not panic or error.
        ctx.log("after removal");
        assert!(store.logs(ctx.id()).unwrap().is_empty());
    }
}
