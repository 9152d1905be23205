//! `witmux witness start | stop | status | health`.

use std::time::Duration;

use anyhow::Context as _;
use witmux_witness::{WitnessError, WitnessStatus};

use crate::cli::{HealthOpts, StartOpts, StatusOpts};
use crate::cmd_session::format_duration;
use crate::context::Context;

pub fn cmd_start(ctx: &Context, opts: &StartOpts) -> anyhow::Result<()> {
    ctx.require_backend()?;
    let witness = ctx.witness();
    match witness.start(opts.agent.as_deref(), &opts.env) {
        Ok(()) => {
            println!("witness started: {}", witness.session_name());
            Ok(())
        }
        Err(WitnessError::AlreadyRunning) => {
            println!("witness already running: {}", witness.session_name());
            Ok(())
        }
        Err(e) => Err(e).context("starting witness"),
    }
}

pub fn cmd_stop(ctx: &Context) -> anyhow::Result<()> {
    let witness = ctx.witness();
    witness.stop().context("stopping witness")?;
    println!("witness stopped: {}", witness.session_name());
    Ok(())
}

pub fn cmd_status(ctx: &Context, opts: &StatusOpts) -> anyhow::Result<()> {
    let status = ctx.witness().status().context("witness status")?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&status_json(&status)?)?);
    } else {
        print!("{}", format_status(&status));
    }
    Ok(())
}

/// Name-only status carries `"alive": null` rather than a guessed value.
fn status_json(status: &WitnessStatus) -> serde_json::Result<serde_json::Value> {
    match status.detail() {
        Some(info) => serde_json::to_value(info),
        None => Ok(serde_json::json!({ "name": status.name(), "alive": null })),
    }
}

/// Prints the health state; returns the process exit code.
pub fn cmd_health(ctx: &Context, opts: &HealthOpts) -> i32 {
    let witness = ctx.witness();
    let max_idle = opts
        .max_idle
        .map_or_else(|| ctx.config.max_idle(), Duration::from_secs);
    let state = witness.health(max_idle);
    println!("{}: {state}", witness.session_name());
    if state.is_healthy() { 0 } else { 1 }
}

fn format_status(status: &WitnessStatus) -> String {
    let Some(info) = status.detail() else {
        return format!("session:  {}\nalive:    unknown\n", status.name());
    };
    let mut lines = vec![format!("session:  {}", info.name)];
    if !info.command.is_empty() {
        lines.push(format!("command:  {}", info.command));
    }
    if let Some(pid) = info.pid {
        lines.push(format!("pid:      {pid}"));
    }
    lines.push(format!("alive:    {}", if info.alive { "yes" } else { "no" }));
    if let Some(created) = info.created_at {
        lines.push(format!("created:  {}", created.to_rfc3339()));
    }
    if info.uptime.is_some() {
        lines.push(format!("uptime:   {}", format_duration(info.uptime)));
    }
    if info.idle.is_some() {
        lines.push(format!("idle:     {}", format_duration(info.idle)));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
