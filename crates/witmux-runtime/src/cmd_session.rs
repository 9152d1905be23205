//! `witmux ls | capture | nudge | kill` — direct session operations.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::Context as _;
use witmux_core::{SessionDescriptor, nudge};

use crate::cli::{CaptureOpts, KillOpts, LsOpts, NudgeOpts};
use crate::context::Context;

pub fn cmd_ls(ctx: &Context, opts: &LsOpts) -> anyhow::Result<()> {
    let sessions = ctx
        .backend
        .list_session_details()
        .context("listing sessions")?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else if sessions.is_empty() {
        println!("(no sessions)");
    } else {
        print!("{}", format_table(&sessions));
    }
    Ok(())
}

pub fn cmd_capture(ctx: &Context, opts: &CaptureOpts) -> anyhow::Result<()> {
    let text = ctx
        .backend
        .capture_pane(&opts.session, opts.lines)
        .with_context(|| format!("capturing {}", opts.session))?;
    println!("{text}");
    Ok(())
}

pub fn cmd_nudge(ctx: &Context, opts: &NudgeOpts) -> anyhow::Result<()> {
    nudge(
        ctx.backend.as_ref(),
        &ctx.locks,
        &opts.session,
        &opts.message,
        Duration::from_secs(opts.timeout),
    )
    .with_context(|| format!("nudging {}", opts.session))
}

pub fn cmd_kill(ctx: &Context, opts: &KillOpts) -> anyhow::Result<()> {
    let result = if opts.with_processes {
        ctx.backend.destroy_session_with_processes(&opts.session)
    } else {
        ctx.backend.destroy_session(&opts.session)
    };
    result.with_context(|| format!("killing {}", opts.session))?;
    println!("killed {}", opts.session);
    Ok(())
}

pub fn format_duration(d: Option<Duration>) -> String {
    let Some(d) = d else {
        return "-".to_string();
    };
    let secs = d.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m", secs / 60),
        3600..86400 => format!("{}h{}m", secs / 3600, secs % 3600 / 60),
        _ => format!("{}d", secs / 86400),
    }
}

pub fn format_table(sessions: &[SessionDescriptor]) -> String {
    let name_w = sessions
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let cmd_w = sessions
        .iter()
        .map(|s| s.command.len())
        .max()
        .unwrap_or(0)
        .max("COMMAND".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<name_w$}  {:<cmd_w$}  {:<5}  {:>7}  IDLE", "NAME", "COMMAND", "ALIVE", "PID");
    for s in sessions {
        let pid = s.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
        let _ = writeln!(
            out,
            "{:<name_w$}  {:<cmd_w$}  {:<5}  {:>7}  {}",
            s.name,
            s.command,
            if s.alive { "yes" } else { "no" },
            pid,
            format_duration(s.idle),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "-");
        assert_eq!(format_duration(Some(Duration::from_secs(42))), "42s");
        assert_eq!(format_duration(Some(Duration::from_secs(125))), "2m");
        assert_eq!(format_duration(Some(Duration::from_secs(3_900))), "1h5m");
        assert_eq!(format_duration(Some(Duration::from_secs(200_000))), "2d");
    }

    #[test]
    fn table_aligns_columns() {
        let sessions = vec![
            SessionDescriptor {
                name: "alpha-witness".into(),
                command: "claude".into(),
                pid: Some(4242),
                alive: true,
                idle: Some(Duration::from_secs(30)),
                ..Default::default()
            },
            SessionDescriptor::named("b"),
        ];
        let table = format_table(&sessions);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME           COMMAND"));
        assert!(lines[1].contains("yes"));
        assert!(lines[1].ends_with("30s"));
        assert!(lines[2].starts_with("b              "));
        assert!(lines[2].ends_with("-"));
    }
}
