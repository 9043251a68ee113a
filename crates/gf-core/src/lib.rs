//! gf-core: shared types, IDs, errors, job domain enums and configuration.
//!
//! This crate is the foundational dependency for all other gf-* crates. It
//! owns the job state machine so that every backing store validates
//! transitions the same way.

pub mod config;
pub mod error;
pub mod ids;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use job::*;
