//! Witness configuration: TOML file with every field defaulted.
//!
//! ```toml
//! [rig]
//! name = "alpha"
//! path = "/srv/rigs/alpha"
//!
//! [witness]
//! default_agent = "claude"
//! start_timeout_secs = 60
//!
//! [witness.env]
//! WITMUX_PATROL = "1"
//!
//! [agents]
//! claude = "claude --dangerously-skip-permissions"
//!
//! [restart]
//! failure_budget = 5
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::restart::RestartPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WitnessConfig {
    pub rig: RigConfig,
    pub witness: WitnessSettings,
    /// Agent alias → startup command.
    pub agents: BTreeMap<String, String>,
    pub restart: RestartPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RigConfig {
    pub name: String,
    pub path: PathBuf,
    /// Session-name prefix. Derived from `name` when unset.
    pub prefix: Option<String>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            path: PathBuf::from("."),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WitnessSettings {
    /// Defaults to the first of `<rig>/witness/rig`, `<rig>/witness`, `<rig>`
    /// that exists.
    pub work_dir: Option<PathBuf>,
    /// Role start command. Ignored when an agent override is given.
    pub start_command: Option<String>,
    pub default_agent: String,
    /// Role environment, applied over the base role variables.
    pub env: BTreeMap<String, String>,
    pub start_timeout_secs: u64,
    /// Wait after creation on backends that cannot report readiness.
    pub settle_delay_ms: u64,
    /// Pause at the end of a successful start.
    pub post_start_delay_ms: u64,
    /// Idle threshold for health checks. 0 disables hung detection.
    pub max_idle_secs: u64,
    /// Directory for `<session>.pid` files. Unset disables PID tracking.
    pub pid_dir: Option<PathBuf>,
}

impl Default for WitnessSettings {
    fn default() -> Self {
        Self {
            work_dir: None,
            start_command: None,
            default_agent: "claude".into(),
            env: BTreeMap::new(),
            start_timeout_secs: 60,
            settle_delay_ms: 2_000,
            post_start_delay_ms: 500,
            max_idle_secs: 0,
            pid_dir: None,
        }
    }
}

impl WitnessConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Load `path` if given, else the default location if that file exists,
    /// else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn session_prefix(&self) -> String {
        match &self.rig.prefix {
            Some(prefix) if !prefix.trim().is_empty() => prefix.trim().to_string(),
            _ => sanitize(&self.rig.name),
        }
    }

    pub fn witness_session_name(&self) -> String {
        format!("{}-witness", self.session_prefix())
    }

    pub fn work_dir(&self) -> PathBuf {
        if let Some(dir) = &self.witness.work_dir {
            return dir.clone();
        }
        let rig = &self.rig.path;
        [rig.join("witness").join("rig"), rig.join("witness")]
            .into_iter()
            .find(|dir| dir.is_dir())
            .unwrap_or_else(|| rig.clone())
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.witness.start_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.witness.settle_delay_ms)
    }

    pub fn post_start_delay(&self) -> Duration {
        Duration::from_millis(self.witness.post_start_delay_ms)
    }

    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.witness.max_idle_secs)
    }
}

/// `$XDG_CONFIG_HOME/witmux/config.toml`, falling back to `~/.config`.
pub fn default_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("witmux").join("config.toml"))
}

/// Session names may not contain `.` or `:` under tmux; keep them plain.
fn sanitize(name: &str) -> String {
    let s: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if s.is_empty() { "default".into() } else { s }
}
