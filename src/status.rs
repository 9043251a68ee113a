//! Client-facing job status, download and viewer lookups.
//!
//! Untrusted callers never see internal error values: failures are reduced
//! to a message plus an opaque `{kind}` descriptor.

use std::path::PathBuf;

use gf_convert::keys;
use gf_core::{Error, JobId, JobState, Result};
use gf_db::Job;
use gf_queue::Queue;
use serde::Serialize;

/// Opaque error descriptor. Serializes as `{}` when `kind` is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

/// Response body for a status request.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl StatusResponse {
    fn found(job: Job, logs: Vec<String>) -> Self {
        Self {
            success: true,
            error: None,
            message: None,
            job: Some(job),
            logs,
        }
    }

    fn not_found(id: &str) -> Self {
        Self {
            success: false,
            error: Some(ErrorDescriptor::default()),
            message: Some(format!("job \"{id}\" doesnt exist")),
            job: None,
            logs: Vec::new(),
        }
    }

    fn failed(err: &Error) -> Self {
        Self {
            success: false,
            error: Some(ErrorDescriptor {
                kind: Some(err.kind()),
            }),
            message: Some("could not read job status".into()),
            job: None,
            logs: Vec::new(),
        }
    }
}

/// Look up the job with the client-supplied `id`.
pub fn job_status(queue: &Queue, id: &str) -> StatusResponse {
    let Ok(job_id) = id.trim().parse::<JobId>() else {
        return StatusResponse::not_found(id);
    };

    let lookup = queue
        .get(job_id)
        .and_then(|job| queue.logs(job_id).map(|logs| (job, logs)));

    match lookup {
        Ok((job, logs)) => {
            StatusResponse::found(job, logs.iter().map(ToString::to_string).collect())
        }
        Err(Error::NotFound { .. }) => StatusResponse::not_found(id),
        Err(e) => {
            tracing::error!(job_id = id, error = %e, "Failed to read job status");
            StatusResponse::failed(&e)
        }
    }
}

/// Path of the converted file of a completed job.
pub fn download_path(queue: &Queue, id: JobId) -> Result<PathBuf> {
    let job = queue.get(id)?;
    if job.state != JobState::Complete {
        return Err(Error::Validation(format!(
            "job {id} is {}, not complete",
            job.state
        )));
    }

    let path = job
        .data_str(keys::GLB_FILE_PATH)
        .map(PathBuf::from)
        .ok_or_else(|| Error::not_found("converted file", id))?;
    if !path.is_file() {
        return Err(Error::not_found("converted file", path.display()));
    }
    Ok(path)
}

/// URL path the viewer loads the model from: `/<uniqueID>/<glbFileName>`.
pub fn viewer_path(job: &Job) -> Option<String> {
    let unique_id = job.data_str(keys::UNIQUE_ID)?;
    let file_name = job.data_str(keys::GLB_FILE_NAME)?;
    Some(format!("/{unique_id}/{file_name}"))
}
