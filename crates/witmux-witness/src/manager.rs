//! Witness lifecycle: start, stop, status and health for one rig's witness
//! session.
//!
//! The multiplexer is the only source of truth. No state file records
//! whether the witness runs; every call asks the backend.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use witmux_core::{
    DEFAULT_NUDGE_TIMEOUT, EnvironmentOverlay, HealthState, NudgeLocks, SessionBackend,
    SessionDescriptor, SessionError, SessionExtras, SessionLabel,
};

use crate::config::WitnessConfig;
use crate::error::WitnessError;
use crate::startup::{ROLE, StartupContext, StartupResolver, base_env};

/// Pane commands that mean the agent has not launched yet.
pub const SUPPORTED_SHELLS: &[&str] = &["bash", "zsh", "sh", "fish", "tcsh", "ksh"];

/// What [`WitnessManager::status`] could observe about a present session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessStatus {
    Detailed(SessionDescriptor),
    /// The session exists but the backend returned no detail. Liveness is
    /// unknown.
    NameOnly(String),
}

impl WitnessStatus {
    pub fn name(&self) -> &str {
        match self {
            Self::Detailed(info) => &info.name,
            Self::NameOnly(name) => name,
        }
    }

    pub fn detail(&self) -> Option<&SessionDescriptor> {
        match self {
            Self::Detailed(info) => Some(info),
            Self::NameOnly(_) => None,
        }
    }

    /// The descriptor, with only the name filled in when detail is missing.
    pub fn into_descriptor(self) -> SessionDescriptor {
        match self {
            Self::Detailed(info) => info,
            Self::NameOnly(name) => SessionDescriptor::named(name),
        }
    }
}

pub struct WitnessManager {
    backend: Arc<dyn SessionBackend>,
    locks: Arc<NudgeLocks>,
    config: WitnessConfig,
    startup: Box<dyn StartupResolver>,
}

impl WitnessManager {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        locks: Arc<NudgeLocks>,
        config: WitnessConfig,
        startup: Box<dyn StartupResolver>,
    ) -> Self {
        Self {
            backend,
            locks,
            config,
            startup,
        }
    }

    pub fn session_name(&self) -> String {
        self.config.witness_session_name()
    }

    pub fn config(&self) -> &WitnessConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn SessionBackend {
        self.backend.as_ref()
    }

    /// Start the witness.
    ///
    /// A session whose agent has died is destroyed and recreated. The check
    /// and the destroy/create are separate backend calls; a concurrent
    /// starter can slip in between and one of the two creates then fails
    /// with [`WitnessError::CreateSession`].
    ///
    /// `env_overrides` are `KEY=VALUE` pairs applied last, so they win over
    /// the base and role environment.
    pub fn start(
        &self,
        agent_override: Option<&str>,
        env_overrides: &[String],
    ) -> Result<(), WitnessError> {
        let overrides = parse_overrides(env_overrides)?;
        let name = self.session_name();

        if self.backend.session_exists(&name)? {
            if self.backend.is_agent_alive(&name) {
                return Err(WitnessError::AlreadyRunning);
            }
            tracing::warn!(session = %name, "witness session is a zombie, recreating");
            self.backend
                .destroy_session(&name)
                .map_err(WitnessError::KillZombie)?;
        }

        let work_dir = self.config.work_dir();
        let prefix = self.config.session_prefix();
        let ctx = StartupContext {
            rig: &self.config.rig.name,
            prefix: &prefix,
            session: &name,
            work_dir: &work_dir,
            agent_override,
        };
        let plan = self.startup.resolve(&ctx)?;

        let mut env = base_env(&ctx);
        env.extend(plan.env);
        env.extend(overrides);

        // The agent only inherits what it is spawned with; the session
        // environment set afterwards covers panes opened later.
        self.backend
            .create_session_with_command_and_env(&name, &work_dir, &plan.command, &env)
            .map_err(WitnessError::CreateSession)?;
        tracing::info!(session = %name, backend = %self.backend.kind(), dir = %work_dir.display(), "witness session created");

        self.apply_env(&name, &env);

        match self.backend.extras() {
            Some(extras) => self.await_ready(extras, &name)?,
            None => thread::sleep(self.config.settle_delay()),
        }

        self.track_pid(&name);
        thread::sleep(self.config.post_start_delay());
        tracing::info!(session = %name, "witness started");
        Ok(())
    }

    fn apply_env(&self, name: &str, env: &EnvironmentOverlay) {
        for (key, value) in env {
            match self.backend.set_environment(name, key, value) {
                Ok(()) => {}
                Err(e @ SessionError::CapabilityUnavailable { .. }) => {
                    tracing::warn!(session = name, error = %e, "session environment not applied");
                    return;
                }
                Err(e) => tracing::warn!(session = name, key = %key, error = %e, "setting session environment"),
            }
        }
    }

    fn await_ready(&self, extras: &dyn SessionExtras, name: &str) -> Result<(), WitnessError> {
        let label = SessionLabel {
            rig: self.config.rig.name.clone(),
            role: ROLE.to_string(),
        };
        if let Err(e) = extras.configure_session(name, &label) {
            tracing::warn!(session = name, error = %e, "configuring session");
        }

        if let Err(e) = extras.wait_for_command(name, SUPPORTED_SHELLS, self.config.start_timeout()) {
            tracing::warn!(session = name, error = %e, "witness did not start, tearing down");
            if let Err(kill) = self.backend.destroy_session_with_processes(name) {
                tracing::warn!(session = name, error = %kill, "destroying failed witness session");
            }
            return Err(WitnessError::WaitForStart(e));
        }

        if let Err(e) = extras.accept_bypass_permissions_warning(name) {
            tracing::warn!(session = name, error = %e, "accepting bypass permissions warning");
        }
        Ok(())
    }

    fn track_pid(&self, name: &str) {
        let (Some(dir), Some(extras)) = (&self.config.witness.pid_dir, self.backend.extras()) else {
            return;
        };
        let result = extras
            .pane_pid(name)
            .map_err(|e| e.to_string())
            .and_then(|pid| pid.ok_or_else(|| "pane has no pid".to_string()))
            .and_then(|pid| write_pid_file(dir, name, pid).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!(session = name, error = %e, "tracking session pid");
        }
    }

    pub fn stop(&self) -> Result<(), WitnessError> {
        let name = self.session_name();
        if !self.backend.session_exists(&name)? {
            return Err(WitnessError::NotRunning);
        }
        self.backend.destroy_session(&name)?;
        tracing::info!(session = %name, "witness stopped");
        Ok(())
    }

    /// Destroy the session with its processes if present, then start fresh.
    pub fn restart(
        &self,
        agent_override: Option<&str>,
        env_overrides: &[String],
    ) -> Result<(), WitnessError> {
        let name = self.session_name();
        if self.backend.session_exists(&name)? {
            match self.backend.destroy_session_with_processes(&name) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(WitnessError::KillZombie(e)),
            }
        }
        self.start(agent_override, env_overrides)
    }

    /// Session detail, or the bare name when the backend cannot describe it.
    pub fn status(&self) -> Result<WitnessStatus, WitnessError> {
        let name = self.session_name();
        if !self.backend.session_exists(&name)? {
            return Err(WitnessError::NotRunning);
        }
        match self.backend.session_info(&name) {
            Ok(Some(info)) => Ok(WitnessStatus::Detailed(info)),
            Ok(None) => Ok(WitnessStatus::NameOnly(name)),
            Err(e) => {
                tracing::debug!(session = %name, error = %e, "session detail unavailable");
                Ok(WitnessStatus::NameOnly(name))
            }
        }
    }

    /// Session exists and its agent is alive. Idle time is not considered.
    pub fn is_running(&self) -> bool {
        self.health(Duration::ZERO) == HealthState::SessionHealthy
    }

    pub fn health(&self, max_idle: Duration) -> HealthState {
        self.backend.check_session_health(&self.session_name(), max_idle)
    }

    pub fn nudge(&self, message: &str) -> Result<(), WitnessError> {
        witmux_core::nudge(
            self.backend.as_ref(),
            &self.locks,
            &self.session_name(),
            message,
            DEFAULT_NUDGE_TIMEOUT,
        )?;
        Ok(())
    }

    pub fn capture(&self, lines: u32) -> Result<String, WitnessError> {
        Ok(self.backend.capture_pane(&self.session_name(), lines)?)
    }
}

/// Split `KEY=VALUE` pairs. The value may itself contain `=`.
pub fn parse_overrides(pairs: &[String]) -> Result<EnvironmentOverlay, WitnessError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(WitnessError::InvalidOverride(pair.clone())),
        })
        .collect()
}

fn write_pid_file(dir: &Path, session: &str, pid: u32) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{session}.pid"));
    std::fs::write(&path, format!("{pid}\n"))?;
    tracing::debug!(session, pid, path = %path.display(), "recorded session pid");
    Ok(())
}
