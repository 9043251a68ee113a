//! # gf-convert
//!
//! The FBX to binary glTF conversion pipeline.
//!
//! This crate provides:
//!
//! - **Archive extraction** ([`extract_archive`]) -- zip decompression on the
//!   blocking pool.
//! - **Asset discovery** ([`dirlist`], [`find_asset`]) -- locate the source
//!   model at the root of an extracted archive.
//! - **Command execution** ([`ToolCommand`]) -- async builder that streams a
//!   child's output line by line and kills it on cancellation.
//! - **Converter discovery** ([`resolve_converter`]) -- find the converter
//!   binary in its install root or on `PATH`.
//! - **The converter job** ([`ConverterJob`]) -- the [`gf_queue::JobHandler`]
//!   running extract, discover and convert in sequence.
//! - **Submission** ([`create_converter_job`]) -- build and enqueue a
//!   converter job from an uploaded archive.

pub mod command;
pub mod discover;
pub mod extract;
pub mod paths;
pub mod pipeline;
pub mod submit;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{Stream, ToolCommand, ToolOutput};
pub use discover::{dirlist, find_asset};
pub use extract::extract_archive;
pub use paths::{project_dir, target_paths, validate_unique_id, TargetPaths};
pub use pipeline::{register_converter, ConverterJob, ConverterSettings};
pub use submit::{converter_job_options, create_converter_job, Submission, JOB_TYPE};
pub use tools::{check_converter, resolve_converter, ConverterInfo};

/// Job data keys shared with clients.
pub mod keys {
    pub const UNIQUE_ID: &str = "uniqueID";
    pub const TITLE: &str = "title";
    pub const ORIGINAL_FILENAME: &str = "originalFilename";
    pub const FILEPATH: &str = "filepath";
    pub const FBX_FILE_PATH: &str = "fbxFilePath";
    pub const GLB_FILE_NAME: &str = "glbFileName";
    pub const GLB_FILE_PATH: &str = "glbFilePath";
}
