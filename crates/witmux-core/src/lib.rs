//! witmux-core: session backend contract.
//!
//! Defines the [`SessionBackend`] trait every multiplexer adapter implements,
//! the shared error taxonomy and its stderr classifier, the health
//! classifier, the per-session nudge lock registry, and the subprocess
//! executor adapters run their CLI through.

pub mod backend;
pub mod classify;
pub mod env;
pub mod error;
pub mod executor;
pub mod health;
pub mod nudge;
pub mod types;

pub use backend::{SessionBackend, SessionExtras, SessionLabel};
pub use classify::{FAILURE_PHRASES, FailureKind, classify_failure, classify_stderr};
pub use env::build_env;
pub use error::{ProcessError, SessionError};
pub use executor::{CliExecutor, CommandRunner};
pub use health::{HealthProbe, classify_health, command_matches};
pub use nudge::{DEFAULT_NUDGE_TIMEOUT, NudgeGuard, NudgeLocks, nudge};
pub use types::{
    BackendKind, EnvironmentOverlay, HealthState, SessionDescriptor, SessionSet, UnknownBackend,
};
