//! Session format string and parser for `list-sessions` / `display-message`.

use chrono::{DateTime, TimeZone, Utc};
use witmux_core::{BackendKind, SessionDescriptor, SessionError};

/// Tab-delimited format describing a session and its active pane.
pub const SESSION_FORMAT: &str = "#{session_name}\t#{pane_current_command}\t#{pane_pid}\t#{pane_dead}\t#{session_created}\t#{session_activity}";

const FIELDS: usize = 6;

/// One parsed line of [`SESSION_FORMAT`] output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TmuxSessionRow {
    pub name: String,
    pub current_cmd: String,
    pub pane_pid: Option<u32>,
    pub pane_dead: bool,
    pub created: Option<i64>,
    pub activity: Option<i64>,
}

impl TmuxSessionRow {
    pub fn into_descriptor(self, now: DateTime<Utc>) -> SessionDescriptor {
        let created_at = self.created.and_then(epoch);
        let last_activity = self.activity.and_then(epoch);
        SessionDescriptor {
            name: self.name,
            command: self.current_cmd,
            pid: self.pane_pid,
            alive: !self.pane_dead,
            created_at,
            uptime: created_at.and_then(|t| (now - t).to_std().ok()),
            last_activity,
            idle: last_activity.and_then(|t| (now - t).to_std().ok()),
        }
    }
}

fn epoch(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Parse the raw output of a command run with [`SESSION_FORMAT`].
pub fn parse_session_rows(output: &str, subcommand: &str) -> Result<Vec<TmuxSessionRow>, SessionError> {
    output
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_line(line).ok_or_else(|| SessionError::Parse {
                backend: BackendKind::Tmux,
                subcommand: subcommand.to_string(),
                detail: format!(
                    "line {}: expected {FIELDS} tab-separated fields: {line:?}",
                    idx + 1
                ),
            })
        })
        .collect()
}

fn parse_line(line: &str) -> Option<TmuxSessionRow> {
    let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if parts.len() < FIELDS {
        return None;
    }
    Some(TmuxSessionRow {
        name: parts[0].to_string(),
        current_cmd: parts[1].to_string(),
        pane_pid: parts[2].trim().parse().ok(),
        pane_dead: parse_bool(parts[3]),
        created: parts[4].trim().parse().ok(),
        activity: parts[5].trim().parse().ok(),
    })
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim(), "1" | "true")
}

/// Value of `key` from `show-environment` output.
///
/// tmux prints `KEY=value` for set variables and `-KEY` for ones marked for
/// removal; the latter has no value.
pub fn parse_show_environment(key: &str, output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parse_single_row() {
        let rows = parse_session_rows(
            "wit-witness\tclaude\t4242\t0\t1700000000\t1700000100\n",
            "list-sessions",
        )
        .expect("should parse");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.name, "wit-witness");
        assert_eq!(row.current_cmd, "claude");
        assert_eq!(row.pane_pid, Some(4242));
        assert!(!row.pane_dead);
        assert_eq!(row.created, Some(1_700_000_000));
        assert_eq!(row.activity, Some(1_700_000_100));
    }

    #[test]
    fn parse_dead_pane_and_blank_lines() {
        let output = "\n a\tzsh\t1\t1\t0\t0\n\n";
        let rows = parse_session_rows(output, "list-sessions").expect("should parse");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].pane_dead);
    }

    #[test]
    fn too_few_fields_is_parse_error() {
        let err = parse_session_rows("a\tb\tc", "list-sessions").unwrap_err();
        match err {
            SessionError::Parse { subcommand, detail, .. } => {
                assert_eq!(subcommand, "list-sessions");
                assert!(detail.contains("line 1"), "{detail}");
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_fields_default_to_none() {
        let rows = parse_session_rows("s\tnode\t\t0\tx\ty", "display-message").expect("parse");
        assert_eq!(rows[0].pane_pid, None);
        assert_eq!(rows[0].created, None);
        assert_eq!(rows[0].activity, None);
    }

    #[test]
    fn descriptor_computes_uptime_and_idle() {
        let now = Utc.timestamp_opt(1_700_000_300, 0).single().expect("valid");
        let row = TmuxSessionRow {
            name: "s".into(),
            current_cmd: "claude".into(),
            pane_pid: Some(7),
            pane_dead: false,
            created: Some(1_700_000_000),
            activity: Some(1_700_000_200),
        };
        let d = row.into_descriptor(now);
        assert!(d.alive);
        assert_eq!(d.uptime, Some(Duration::from_secs(300)));
        assert_eq!(d.idle, Some(Duration::from_secs(100)));
        assert_eq!(d.pid, Some(7));
    }

    #[test]
    fn future_activity_has_no_idle() {
        let now = Utc.timestamp_opt(100, 0).single().expect("valid");
        let row = TmuxSessionRow {
            activity: Some(200),
            ..Default::default()
        };
        assert_eq!(row.into_descriptor(now).idle, None);
    }

    #[test]
    fn show_environment_values() {
        assert_eq!(
            parse_show_environment("WITMUX_ROLE", "WITMUX_ROLE=witness"),
            Some("witness".to_string())
        );
        assert_eq!(
            parse_show_environment("K", "K=a=b"),
            Some("a=b".to_string())
        );
        assert_eq!(parse_show_environment("K", "-K"), None);
        assert_eq!(parse_show_environment("K", "KEY=other"), None);
    }
}
