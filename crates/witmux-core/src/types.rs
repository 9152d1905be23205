use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Backend kind ─────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Tmux,
    Amux,
}

impl BackendKind {
    pub const ALL: [Self; 2] = [Self::Tmux, Self::Amux];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tmux => "tmux",
            Self::Amux => "amux",
        }
    }

    /// Interpret a selector value. Only `amux` picks amux; anything else,
    /// including an empty or missing value, picks tmux.
    pub fn from_selector(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("amux") => Self::Amux,
            _ => Self::Tmux,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session backend: {}", self.0)
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tmux" => Ok(Self::Tmux),
            "amux" => Ok(Self::Amux),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

// ─── Session descriptor ───────────────────────────────────────────

/// Detail about one multiplexer session, as parsed from backend output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub name: String,
    /// Command hosted by the session's active pane.
    pub command: String,
    pub pid: Option<u32>,
    /// Whether the hosted process is still running.
    pub alive: bool,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "opt_secs")]
    pub uptime: Option<Duration>,
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, with = "opt_secs")]
    pub idle: Option<Duration>,
}

impl SessionDescriptor {
    /// Name-only descriptor for backends that cannot supply detail.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

// ─── Session set ──────────────────────────────────────────────────

/// Point-in-time set of session names for cheap repeated membership checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSet {
    names: BTreeSet<String>,
}

impl SessionSet {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

// ─── Health ───────────────────────────────────────────────────────

/// Result of a session health check. Recomputed on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    SessionHealthy,
    /// No multiplexer session with that name.
    SessionDead,
    /// Session present, hosted agent gone (zombie).
    AgentDead,
    /// Agent alive but idle past the allowed threshold.
    AgentHung,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionHealthy => "healthy",
            Self::SessionDead => "session-dead",
            Self::AgentDead => "agent-dead",
            Self::AgentHung => "agent-hung",
        }
    }

    pub fn is_healthy(self) -> bool {
        self == Self::SessionHealthy
    }

    /// Session exists but is not usable.
    pub fn is_zombie(self) -> bool {
        matches!(self, Self::AgentDead | Self::AgentHung)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Environment ──────────────────────────────────────────────────

/// Variables layered over the inherited environment at session creation.
pub type EnvironmentOverlay = BTreeMap<String, String>;
