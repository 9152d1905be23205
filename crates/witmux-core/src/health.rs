//! Session health classification.
//!
//! Pure and side-effect free: backends gather the telemetry, this module
//! decides. [`classify_health`] is the single decision point.

use std::time::Duration;

use crate::types::HealthState;

/// Telemetry gathered for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthProbe {
    pub exists: bool,
    pub alive: bool,
    /// Time since the session last produced output, when known.
    pub idle: Option<Duration>,
}

impl HealthProbe {
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Classify a session. Checks run in priority order:
///
/// 1. no session → [`HealthState::SessionDead`]
/// 2. session without a live agent → [`HealthState::AgentDead`]
/// 3. `max_idle` non-zero and idle longer than it → [`HealthState::AgentHung`]
/// 4. otherwise [`HealthState::SessionHealthy`]
///
/// Unknown idle time never counts as hung.
#[must_use]
pub fn classify_health(probe: HealthProbe, max_idle: Duration) -> HealthState {
    if !probe.exists {
        return HealthState::SessionDead;
    }
    if !probe.alive {
        return HealthState::AgentDead;
    }
    match probe.idle {
        Some(idle) if !max_idle.is_zero() && idle > max_idle => HealthState::AgentHung,
        _ => HealthState::SessionHealthy,
    }
}

/// Whether `command` is one of the expected programs.
///
/// An empty expectation list accepts any command.
pub fn command_matches(command: &str, expected: &[&str]) -> bool {
    expected.is_empty() || expected.iter().any(|want| command.contains(want))
}
