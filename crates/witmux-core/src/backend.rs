use std::path::Path;
use std::time::Duration;

use crate::error::SessionError;
use crate::health::{HealthProbe, classify_health, command_matches};
use crate::types::{BackendKind, EnvironmentOverlay, HealthState, SessionDescriptor, SessionSet};

/// Abstraction over terminal multiplexers hosting agent sessions.
///
/// Synchronous: every operation may block for one subprocess round trip.
/// Callers depend on this trait only, never on a concrete adapter. Backends
/// that cannot perform an operation return
/// [`SessionError::CapabilityUnavailable`] instead of silently succeeding.
pub trait SessionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    // ── lifecycle ──

    /// Create a detached session running the backend's default shell.
    fn create_session(&self, name: &str, work_dir: &Path) -> Result<(), SessionError>;

    fn create_session_with_command(
        &self,
        name: &str,
        work_dir: &Path,
        command: &str,
    ) -> Result<(), SessionError>;

    /// Like [`Self::create_session_with_command`], with `env` layered over
    /// the inherited environment of the hosted process.
    fn create_session_with_command_and_env(
        &self,
        name: &str,
        work_dir: &Path,
        command: &str,
        env: &EnvironmentOverlay,
    ) -> Result<(), SessionError>;

    fn destroy_session(&self, name: &str) -> Result<(), SessionError>;

    /// Destroy the session and every process in its tree.
    ///
    /// Only an alias of [`Self::destroy_session`] on backends whose plain
    /// destroy already tears down the whole tree.
    fn destroy_session_with_processes(&self, name: &str) -> Result<(), SessionError>;

    /// Never reports "not found" as an error.
    fn session_exists(&self, name: &str) -> Result<bool, SessionError>;

    /// Empty when the daemon is not running.
    fn list_session_names(&self) -> Result<Vec<String>, SessionError>;

    fn list_session_details(&self) -> Result<Vec<SessionDescriptor>, SessionError>;

    /// Detail for one session, `None` if it does not exist.
    fn session_info(&self, name: &str) -> Result<Option<SessionDescriptor>, SessionError> {
        Ok(self
            .list_session_details()?
            .into_iter()
            .find(|s| s.name == name))
    }

    fn session_set(&self) -> Result<SessionSet, SessionError> {
        Ok(SessionSet::new(self.list_session_names()?))
    }

    // ── input / output ──

    /// Deliver `text` literally as keyboard input to the active pane.
    fn send_keys(&self, name: &str, text: &str) -> Result<(), SessionError>;

    /// Last `max_lines` lines of rendered output. Callers must accept either
    /// empty text or an error for a session that does not exist.
    fn capture_pane(&self, name: &str, max_lines: u32) -> Result<String, SessionError>;

    // ── environment ──

    fn set_environment(&self, name: &str, key: &str, value: &str) -> Result<(), SessionError>;

    fn get_environment(&self, name: &str, key: &str) -> Result<String, SessionError>;

    // ── liveness ──

    /// Whether the session's hosted agent process is running.
    fn is_agent_alive(&self, name: &str) -> bool;

    /// Time since the session last produced output, if the backend tracks it.
    fn session_idle(&self, name: &str) -> Option<Duration>;

    /// Whether the backend can serve requests. For amux this means its
    /// daemon answers; tmux starts a server on demand, so a runnable binary
    /// is enough.
    fn is_available(&self) -> bool;

    /// Alive and, when `expected` is non-empty, hosting a command containing
    /// one of the expected substrings.
    fn is_agent_running(&self, name: &str, expected: &[&str]) -> bool {
        if !self.is_agent_alive(name) {
            return false;
        }
        if expected.is_empty() {
            return true;
        }
        match self.session_info(name) {
            Ok(Some(info)) => command_matches(&info.command, expected),
            _ => false,
        }
    }

    /// Classify the session. A zero `max_idle` disables the hung check.
    fn check_session_health(&self, name: &str, max_idle: Duration) -> HealthState {
        let exists = self.session_exists(name).unwrap_or(false);
        if !exists {
            return HealthState::SessionDead;
        }
        let alive = self.is_agent_alive(name);
        let idle = if alive && !max_idle.is_zero() {
            self.session_idle(name)
        } else {
            None
        };
        classify_health(
            HealthProbe {
                exists,
                alive,
                idle,
            },
            max_idle,
        )
    }

    /// Optional extended capabilities. `None` for backends without them.
    fn extras(&self) -> Option<&dyn SessionExtras> {
        None
    }
}

/// Who a session belongs to, for backends that decorate sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLabel {
    pub rig: String,
    pub role: String,
}

/// Extended capabilities some backends offer on top of [`SessionBackend`].
///
/// Probed through [`SessionBackend::extras`]; callers must still work when it
/// returns `None`.
pub trait SessionExtras: Send + Sync {
    /// Apply theming and status-line decoration.
    fn configure_session(&self, name: &str, label: &SessionLabel) -> Result<(), SessionError>;

    /// Block until the pane runs something other than `exclude` (typically
    /// the plain shells), or fail with [`SessionError::StartTimeout`].
    fn wait_for_command(
        &self,
        name: &str,
        exclude: &[&str],
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Dismiss the agent's bypass-permissions confirmation if it is showing.
    fn accept_bypass_permissions_warning(&self, name: &str) -> Result<(), SessionError>;

    /// PID of the process hosted by the session's active pane.
    fn pane_pid(&self, name: &str) -> Result<Option<u32>, SessionError>;
}
