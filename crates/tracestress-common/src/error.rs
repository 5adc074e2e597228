//! Unified error types for the tracestress workspace.
//!
//! Only fatal conditions live here. Graceful early stops (a failed resume
//! request, an interrupted wait, a subject that exits on its own) are not
//! errors: they end a run with a [`crate::types::StopReason`] instead.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StressError {
    /// The subject process could not be created.
    #[error("{name}: fork failed: {source}")]
    CreationFailure {
        /// Stressor name, for diagnostics.
        name: String,
        /// Errno reported by `fork(2)`.
        source: Errno,
    },

    /// A ptrace request failed before tracing was established.
    #[error("{name}: ptrace {request} on pid {pid} failed: {source}")]
    FacilityFailure {
        /// Stressor name, for diagnostics.
        name: String,
        /// The ptrace request that failed.
        request: &'static str,
        /// Subject process id.
        pid: i32,
        /// Errno reported by `ptrace(2)`.
        source: Errno,
    },

    /// Waiting on the subject failed for a reason other than interruption.
    #[error("{name}: waitpid on pid {pid} failed: {source}")]
    WaitFailure {
        /// Stressor name, for diagnostics.
        name: String,
        /// Subject process id.
        pid: i32,
        /// Errno reported by `waitpid(2)`.
        source: Errno,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_failure_names_the_stressor() {
        let err = StressError::CreationFailure {
            name: "ptrace".into(),
            source: Errno::EAGAIN,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("ptrace: fork failed"));
    }

    #[test]
    fn facility_failure_names_the_request() {
        let err = StressError::FacilityFailure {
            name: "ptrace".into(),
            request: "PTRACE_SETOPTIONS",
            pid: 42,
            source: Errno::ESRCH,
        };
        let msg = err.to_string();
        assert!(msg.contains("PTRACE_SETOPTIONS"));
        assert!(msg.contains("pid 42"));
    }
}
