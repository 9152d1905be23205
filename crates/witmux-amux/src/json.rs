//! Structured `amux ls --json` / `amux info --json` output.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use witmux_core::{BackendKind, SessionDescriptor, SessionError};

#[derive(Debug, Clone, Deserialize)]
pub struct AmuxSession {
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub pid: Option<u32>,
    /// Listed sessions without an explicit flag are running.
    #[serde(default = "listed_is_alive")]
    pub alive: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uptime_seconds: Option<f64>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub idle_seconds: Option<f64>,
}

fn listed_is_alive() -> bool {
    true
}

fn seconds(value: Option<f64>) -> Option<Duration> {
    value.and_then(|v| Duration::try_from_secs_f64(v).ok())
}

impl From<AmuxSession> for SessionDescriptor {
    fn from(s: AmuxSession) -> Self {
        SessionDescriptor {
            name: s.name,
            command: s.command,
            pid: s.pid,
            alive: s.alive,
            created_at: s.created_at,
            uptime: seconds(s.uptime_seconds),
            last_activity: s.last_activity,
            idle: seconds(s.idle_seconds),
        }
    }
}

fn parse_error(subcommand: &str, err: &serde_json::Error) -> SessionError {
    SessionError::Parse {
        backend: BackendKind::Amux,
        subcommand: subcommand.to_string(),
        detail: err.to_string(),
    }
}

/// Parse `ls --json`. Empty output means no sessions.
pub fn parse_session_list(output: &str) -> Result<Vec<AmuxSession>, SessionError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(output).map_err(|e| parse_error("ls", &e))
}

/// Parse `info --json` for a single session.
pub fn parse_session_info(output: &str) -> Result<AmuxSession, SessionError> {
    serde_json::from_str(output).map_err(|e| parse_error("info", &e))
}
