//! Error taxonomy shared by every session backend.

use std::process::ExitStatus;

use thiserror::Error;

use crate::types::BackendKind;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The multiplexer daemon cannot be reached. Listing callers treat this
    /// as "no sessions"; everywhere else it is a hard failure.
    #[error("{backend} daemon not running")]
    BackendUnavailable { backend: BackendKind },

    #[error("session already exists")]
    SessionExists,

    #[error("session not found")]
    SessionNotFound,

    /// The active backend has no way to perform `operation`.
    #[error("{backend} does not support {operation}")]
    CapabilityUnavailable {
        backend: BackendKind,
        operation: String,
    },

    #[error("nudge lock timeout for session {session:?}: previous nudge may be hung")]
    LockTimeout { session: String },

    #[error("{backend} {subcommand}: {stderr}")]
    CommandFailed {
        backend: BackendKind,
        subcommand: String,
        stderr: String,
    },

    #[error("{backend} {subcommand}: {source}")]
    Process {
        backend: BackendKind,
        subcommand: String,
        #[source]
        source: ProcessError,
    },

    #[error("{backend} {subcommand}: parsing output: {detail}")]
    Parse {
        backend: BackendKind,
        subcommand: String,
        detail: String,
    },

    #[error("session {session:?} did not start within {waited_ms}ms")]
    StartTimeout { session: String, waited_ms: u64 },
}

impl SessionError {
    pub fn capability(backend: BackendKind, operation: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            backend,
            operation: operation.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

/// Underlying failure of a subprocess that produced no stderr to classify.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("{0}")]
    Exit(ExitStatus),
}
