//! # gf-queue
//!
//! The job queue engine.
//!
//! This crate provides:
//!
//! - **[`Queue`]** -- enqueue, per-type dispatch loops bounded by a
//!   semaphore, heartbeats, the stuck-job watchdog and graceful shutdown.
//! - **[`JobHandler`]** trait -- the processing function registered for a job
//!   type.
//! - **[`JobContext`]** -- what a handler sees: the job snapshot, atomic data
//!   merges, best-effort logging and the job's cancellation token.
//! - **[`Backoff`]** -- the retry delay policy.

pub mod backoff;
pub mod context;
pub mod engine;
pub mod handler;
pub mod settings;
mod watchdog;

pub use backoff::Backoff;
pub use context::JobContext;
pub use engine::{Queue, ShutdownReport};
pub use handler::JobHandler;
pub use settings::QueueSettings;
