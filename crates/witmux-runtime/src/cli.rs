//! CLI definition using clap derive.

use std::convert::Infallible;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use witmux_core::BackendKind;

#[derive(Debug, Parser)]
#[command(name = "witmux", version, about = "Agent session supervisor for tmux and amux")]
pub struct Cli {
    /// Witness configuration file (TOML)
    #[arg(long, global = true, env = "WITMUX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session backend: `amux` selects amux, anything else tmux
    #[arg(long, global = true, env = "WITMUX_SESSION_BACKEND", value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// tmux server socket name (tmux -L)
    #[arg(long, global = true)]
    pub tmux_socket: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_backend(value: &str) -> Result<BackendKind, Infallible> {
    Ok(BackendKind::from_selector(Some(value)))
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the rig's witness session
    Witness {
        #[command(subcommand)]
        action: WitnessCommand,
    },
    /// List sessions on the backend
    Ls(LsOpts),
    /// Print the last lines of a session's output
    Capture(CaptureOpts),
    /// Type a message into a session, serialized with other nudges
    Nudge(NudgeOpts),
    /// Destroy a session
    Kill(KillOpts),
}

#[derive(Debug, Subcommand)]
pub enum WitnessCommand {
    /// Start the witness (recreates a zombie session)
    Start(StartOpts),
    /// Stop the witness
    Stop,
    /// Show witness session details
    Status(StatusOpts),
    /// Classify witness health; exits non-zero unless healthy
    Health(HealthOpts),
    /// Monitor the witness until Ctrl-C, restarting it when it dies
    Watch(WatchOpts),
}

#[derive(Debug, Default, Args)]
pub struct StartOpts {
    /// Agent alias overriding the configured start command
    #[arg(long)]
    pub agent: Option<String>,

    /// KEY=VALUE environment override (repeatable, highest priority)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,
}

#[derive(Debug, Default, Args)]
pub struct StatusOpts {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Default, Args)]
pub struct HealthOpts {
    /// Idle seconds before the agent counts as hung (default: config)
    #[arg(long)]
    pub max_idle: Option<u64>,
}

#[derive(Debug, Args)]
pub struct WatchOpts {
    /// Seconds between health checks
    #[arg(long, default_value = "30")]
    pub interval: u64,

    /// Idle seconds before the agent counts as hung (default: config)
    #[arg(long)]
    pub max_idle: Option<u64>,

    /// Also restart hung agents, not only dead ones
    #[arg(long)]
    pub restart_hung: bool,
}

#[derive(Debug, Default, Args)]
pub struct LsOpts {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CaptureOpts {
    pub session: String,

    #[arg(long, default_value = "50")]
    pub lines: u32,
}

#[derive(Debug, Args)]
pub struct NudgeOpts {
    pub session: String,
    pub message: String,

    /// Seconds to wait for a previous nudge to the same session
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Debug, Args)]
pub struct KillOpts {
    pub session: String,

    /// Also terminate every process in the session's tree
    #[arg(long)]
    pub with_processes: bool,
}
