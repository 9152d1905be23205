//! Startup command resolution.
//!
//! Role and agent configuration live outside this crate; the manager only
//! needs a command string and an environment map, obtained through
//! [`StartupResolver`].

use std::collections::BTreeMap;
use std::path::Path;

use witmux_core::EnvironmentOverlay;

use crate::config::WitnessConfig;
use crate::error::WitnessError;

pub const ROLE: &str = "witness";

/// What the resolver knows about the session being started.
#[derive(Debug, Clone, Copy)]
pub struct StartupContext<'a> {
    pub rig: &'a str,
    pub prefix: &'a str,
    pub session: &'a str,
    pub work_dir: &'a Path,
    pub agent_override: Option<&'a str>,
}

/// Resolved command plus the role-configuration environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupPlan {
    pub command: String,
    pub env: EnvironmentOverlay,
}

pub trait StartupResolver: Send + Sync {
    fn resolve(&self, ctx: &StartupContext<'_>) -> Result<StartupPlan, WitnessError>;
}

const BUILTIN_AGENTS: &[(&str, &str)] = &[
    ("claude", "claude --dangerously-skip-permissions"),
    ("codex", "codex"),
    ("gemini", "gemini"),
];

/// Resolver backed by [`WitnessConfig`].
///
/// An agent override ignores the role `start_command` and picks the aliased
/// agent instead. `{rig}`, `{prefix}`, `{session}` and `{role}` placeholders
/// are expanded in the command and in environment values.
#[derive(Debug, Clone)]
pub struct ConfiguredStartup {
    start_command: Option<String>,
    default_agent: String,
    agents: BTreeMap<String, String>,
    env: BTreeMap<String, String>,
}

impl ConfiguredStartup {
    pub fn from_config(config: &WitnessConfig) -> Self {
        Self {
            start_command: config.witness.start_command.clone(),
            default_agent: config.witness.default_agent.clone(),
            agents: config.agents.clone(),
            env: config.witness.env.clone(),
        }
    }

    fn agent_command(&self, alias: &str) -> Option<String> {
        self.agents.get(alias).cloned().or_else(|| {
            BUILTIN_AGENTS
                .iter()
                .find(|(name, _)| *name == alias)
                .map(|(_, cmd)| (*cmd).to_string())
        })
    }
}

impl StartupResolver for ConfiguredStartup {
    fn resolve(&self, ctx: &StartupContext<'_>) -> Result<StartupPlan, WitnessError> {
        let role_command = self
            .start_command
            .as_deref()
            .filter(|c| ctx.agent_override.is_none() && !c.trim().is_empty());

        let command = match role_command {
            Some(cmd) => cmd.to_string(),
            None => {
                let alias = ctx.agent_override.unwrap_or(&self.default_agent);
                self.agent_command(alias)
                    .ok_or_else(|| WitnessError::Startup(format!("unknown agent alias {alias:?}")))?
            }
        };

        Ok(StartupPlan {
            command: expand(&command, ctx),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), expand(v, ctx)))
                .collect(),
        })
    }
}

fn expand(pattern: &str, ctx: &StartupContext<'_>) -> String {
    pattern
        .replace("{rig}", ctx.rig)
        .replace("{prefix}", ctx.prefix)
        .replace("{session}", ctx.session)
        .replace("{role}", ROLE)
}

/// Variables every witness session gets, before role and caller overrides.
pub fn base_env(ctx: &StartupContext<'_>) -> EnvironmentOverlay {
    let mut env = EnvironmentOverlay::from([
        ("WITMUX_ROLE".to_string(), ROLE.to_string()),
        ("WITMUX_RIG".to_string(), ctx.rig.to_string()),
        ("WITMUX_SESSION".to_string(), ctx.session.to_string()),
    ]);
    if let Some(agent) = ctx.agent_override {
        env.insert("WITMUX_AGENT".into(), agent.to_string());
    }
    env
}
