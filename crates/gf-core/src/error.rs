//! Unified error type for the conversion job engine.
//!
//! All crates funnel their failures into [`Error`]. Each variant maps to an
//! opaque descriptor via [`Error::kind`] so that untrusted callers only ever
//! see a message and a kind, never an internal error object.

use std::fmt;

use crate::job::JobState;

/// Unified error type covering all failure modes of the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The backing store is unreachable or an I/O fault occurred inside it.
    #[error("Persistence error: {source}")]
    Persistence {
        /// The underlying store error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A state change was attempted that the job state machine forbids.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State the job was in.
        from: JobState,
        /// State that was requested.
        to: JobState,
    },

    /// The uploaded archive did not contain the expected asset.
    #[error("Could not find a .{extension} file at the root of {directory}")]
    MissingAsset {
        /// Expected extension, without the dot.
        extension: String,
        /// Directory that was searched.
        directory: String,
    },

    /// The external converter failed.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Human-readable error description.
        message: String,
        /// Exit code of the converter, if it exited normally.
        exit_code: Option<i32>,
        /// Lines the converter wrote to its error stream.
        stderr: Vec<String>,
    },

    /// The job was forcibly terminated by the shutdown drain timeout.
    #[error("shutdown")]
    Shutdown,

    /// The job stopped sending heartbeats and was reclaimed by the watchdog.
    #[error("Stalled: no heartbeat for {0} seconds")]
    Stalled(u64),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Opaque, stable descriptor of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::Persistence { .. } => "persistence",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::MissingAsset { .. } => "missing_asset",
            Error::Conversion { .. } => "conversion",
            Error::Shutdown => "shutdown",
            Error::Stalled(_) => "stalled",
            Error::Io { .. } => "io",
            Error::Validation(_) => "validation",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether a job failing with this error may be re-dispatched when it
    /// still has attempts left.
    ///
    /// User-input faults and logic faults will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::MissingAsset { .. }
                | Error::Validation(_)
                | Error::InvalidTransition { .. }
                | Error::Shutdown
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Persistence`].
    pub fn persistence(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Persistence {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Conversion`].
    pub fn conversion(
        message: impl Into<String>,
        exit_code: Option<i32>,
        stderr: Vec<String>,
    ) -> Self {
        Error::Conversion {
            message: message.into(),
            exit_code,
            stderr,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("job", 42);
        assert_eq!(err.to_string(), "job not found: 42");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn persistence_display() {
        let err = Error::persistence("connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.kind(), "persistence");
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_transition_display() {
        let err = Error::InvalidTransition {
            from: JobState::Complete,
            to: JobState::Active,
        };
        assert_eq!(err.to_string(), "Invalid transition: complete -> active");
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_asset_is_not_retryable() {
        let err = Error::MissingAsset {
            extension: "fbx".into(),
            directory: "/projects/abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "Could not find a .fbx file at the root of /projects/abc"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn conversion_keeps_diagnostics() {
        let err = Error::conversion("converter reported errors", Some(0), vec!["warn".into()]);
        match &err {
            Error::Conversion { exit_code, stderr, .. } => {
                assert_eq!(*exit_code, Some(0));
                assert_eq!(stderr, &vec!["warn".to_string()]);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn shutdown_reason_is_plain() {
        assert_eq!(Error::Shutdown.to_string(), "shutdown");
        assert_eq!(Error::Shutdown.kind(), "shutdown");
        assert!(!Error::Shutdown.is_retryable());
    }

    #[test]
    fn stalled_display() {
        let err = Error::Stalled(60);
        assert_eq!(err.to_string(), "Stalled: no heartbeat for 60 seconds");
        assert!(err.is_retryable());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.kind(), "io");
    }
}
