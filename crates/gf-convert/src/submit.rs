//! Building and enqueueing converter jobs.

use std::path::PathBuf;

use gf_core::{JobData, JobOptions, Priority, Result, UniqueId};
use gf_db::Job;
use gf_queue::Queue;
use serde_json::Value;

use crate::keys;
use crate::paths::validate_unique_id;

/// Job type handled by [`ConverterJob`](crate::ConverterJob).
pub const JOB_TYPE: &str = "converter-job";

/// An uploaded archive waiting to be converted.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Name of the file as uploaded by the client.
    pub original_filename: String,
    /// Where the upload was stored.
    pub filepath: PathBuf,
    /// Directory name for the extracted project; generated when absent.
    pub unique_id: Option<String>,
    /// Additional client metadata stored alongside the reserved keys.
    pub extra: JobData,
}

impl Submission {
    pub fn new(original_filename: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            original_filename: original_filename.into(),
            filepath: filepath.into(),
            ..Self::default()
        }
    }

    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }
}

/// High priority, a single attempt, backoff enabled, kept after completion.
pub fn converter_job_options() -> JobOptions {
    JobOptions::default()
        .priority(Priority::High)
        .attempts(1)
        .backoff(true)
        .remove_on_complete(false)
}

/// Enqueue a converter job for `submission`.
pub fn create_converter_job(queue: &Queue, submission: Submission) -> Result<Job> {
    let unique_id = submission
        .unique_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| UniqueId::generate().to_string());
    validate_unique_id(&unique_id)?;

    let mut data = submission.extra;
    data.insert(keys::UNIQUE_ID.into(), Value::String(unique_id));
    data.insert(
        keys::TITLE.into(),
        Value::String(format!(
            "Converter Job for \"{}\"",
            submission.original_filename
        )),
    );
    data.insert(
        keys::ORIGINAL_FILENAME.into(),
        Value::String(submission.original_filename),
    );
    data.insert(
        keys::FILEPATH.into(),
        Value::String(submission.filepath.to_string_lossy().to_string()),
    );

    queue.enqueue(JOB_TYPE, data, converter_job_options())
}
