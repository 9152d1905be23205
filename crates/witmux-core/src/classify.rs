//! Maps a failed multiplexer subprocess to the shared error taxonomy.
//!
//! Multiplexer CLIs report failures only as free text on stderr, and that
//! text is not a stable interface. Every phrase we rely on lives in
//! [`FAILURE_PHRASES`]; extend the table rather than matching elsewhere.

use crate::error::{ProcessError, SessionError};
use crate::types::BackendKind;

/// Classification of a failure before backend context is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BackendUnavailable,
    SessionExists,
    SessionNotFound,
    Unclassified,
}

/// Ordered phrase table, matched case-insensitively. First match wins, so
/// "no such file or directory" must stay ahead of the generic "not found".
pub const FAILURE_PHRASES: &[(&str, FailureKind)] = &[
    ("daemon not running", FailureKind::BackendUnavailable),
    ("connection refused", FailureKind::BackendUnavailable),
    ("no such file or directory", FailureKind::BackendUnavailable),
    ("no server running", FailureKind::BackendUnavailable),
    ("error connecting to", FailureKind::BackendUnavailable),
    ("already exists", FailureKind::SessionExists),
    ("duplicate session", FailureKind::SessionExists),
    ("not found", FailureKind::SessionNotFound),
    ("no such session", FailureKind::SessionNotFound),
    ("can't find session", FailureKind::SessionNotFound),
];

/// Classify raw stderr text.
pub fn classify_stderr(stderr: &str) -> FailureKind {
    let lower = stderr.to_ascii_lowercase();
    FAILURE_PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map_or(FailureKind::Unclassified, |&(_, kind)| kind)
}

/// Build the typed error for a failed invocation of `backend subcommand`.
///
/// Unmatched stderr is carried verbatim; with no stderr at all, the
/// underlying process failure becomes the error source.
pub fn classify_failure(
    backend: BackendKind,
    subcommand: &str,
    stderr: &str,
    process: ProcessError,
) -> SessionError {
    let stderr = stderr.trim();
    match classify_stderr(stderr) {
        FailureKind::BackendUnavailable => SessionError::BackendUnavailable { backend },
        FailureKind::SessionExists => SessionError::SessionExists,
        FailureKind::SessionNotFound => SessionError::SessionNotFound,
        FailureKind::Unclassified if !stderr.is_empty() => SessionError::CommandFailed {
            backend,
            subcommand: subcommand.to_string(),
            stderr: stderr.to_string(),
        },
        FailureKind::Unclassified => SessionError::Process {
            backend,
            subcommand: subcommand.to_string(),
            source: process,
        },
    }
}
