//! Process-tree inspection for tmux panes.

use std::collections::HashMap;

/// One entry from `ps -eo pid=,ppid=,args=`.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub args: String,
}

/// Snapshot of all running processes on the host, keyed by PID.
pub type ProcessMap = HashMap<u32, ProcessInfo>;

/// Known interactive shells. A pane whose foreground command is one of these
/// is a bare terminal unless the shell has children.
pub const SHELL_CMDS: &[&str] = &[
    "zsh", "bash", "fish", "sh", "csh", "tcsh", "ksh", "dash", "nu", "pwsh",
];

/// Executable name of a pane command: login-shell dash and path stripped.
pub fn command_base(current_cmd: &str) -> &str {
    let cmd = current_cmd.trim().trim_start_matches('-');
    cmd.rsplit('/').next().unwrap_or(cmd)
}

/// Whether `current_cmd` is a plain interactive shell.
pub fn is_shell(current_cmd: &str) -> bool {
    let base = command_base(current_cmd);
    SHELL_CMDS.iter().any(|&s| base.eq_ignore_ascii_case(s))
}

/// Scan all running processes using `ps -eo pid=,ppid=,args=`.
///
/// Returns an empty map on failure (non-fatal).
pub fn scan_all_processes() -> ProcessMap {
    let output = match std::process::Command::new("ps")
        .args(["-eo", "pid=,ppid=,args="])
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            tracing::debug!("ps failed: {e}");
            return ProcessMap::new();
        }
    };
    match String::from_utf8(output.stdout) {
        Ok(s) => parse_ps_output(&s),
        Err(_) => ProcessMap::new(),
    }
}

pub(crate) fn parse_ps_output(output: &str) -> ProcessMap {
    output
        .lines()
        .filter_map(parse_ps_line)
        .map(|info| (info.pid, info))
        .collect()
}

fn parse_ps_line(line: &str) -> Option<ProcessInfo> {
    let mut fields = line.split_whitespace();
    let pid: u32 = fields.next()?.parse().ok()?;
    let ppid: u32 = fields.next()?.parse().ok()?;
    let args = fields.collect::<Vec<_>>().join(" ");
    Some(ProcessInfo { pid, ppid, args })
}

/// Whether `pid` has at least one child in `map`.
pub fn has_children(pid: u32, map: &ProcessMap) -> bool {
    map.values().any(|p| p.ppid == pid)
}

/// All descendants of `root`, deepest first, excluding `root` itself.
pub fn descendants(root: u32, map: &ProcessMap) -> Vec<u32> {
    let mut order = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for child in map.values().filter(|p| p.ppid == parent && p.pid != root) {
            if !order.contains(&child.pid) {
                order.push(child.pid);
                frontier.push(child.pid);
            }
        }
    }
    order.reverse();
    order
}

/// Send SIGTERM to every pid in `pids` (best effort).
pub fn terminate(pids: &[u32]) {
    if pids.is_empty() {
        return;
    }
    let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
    match std::process::Command::new("kill")
        .arg("-TERM")
        .args(&pids)
        .output()
    {
        Ok(out) if !out.status.success() => {
            tracing::debug!(
                "kill -TERM {}: {}",
                pids.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("failed to run kill: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pm(entries: &[(u32, u32, &str)]) -> ProcessMap {
        entries
            .iter()
            .map(|&(pid, ppid, args)| {
                (
                    pid,
                    ProcessInfo {
                        pid,
                        ppid,
                        args: args.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn parse_ps_output_basic() {
        let output = "    1     0 /sbin/init\n12345  6789 node /path/to/claude/cli.js\n";
        let map = parse_ps_output(output);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&1].ppid, 0);
        assert_eq!(map[&1].args, "/sbin/init");
        assert_eq!(map[&12345].ppid, 6789);
        assert_eq!(map[&12345].args, "node /path/to/claude/cli.js");
    }

    #[test]
    fn parse_ps_output_skips_junk() {
        let output = "\n   \nPID PPID\n42 1 sleep 60\n100 50\n";
        let map = parse_ps_output(output);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&100].args, "");
    }

    #[test]
    fn shells_are_recognized() {
        for shell in SHELL_CMDS {
            assert!(is_shell(shell), "{shell}");
        }
        assert!(is_shell("-zsh"));
        assert!(is_shell("/bin/bash"));
        assert!(!is_shell("claude"));
        assert!(!is_shell("node"));
    }

    #[test]
    fn command_base_strips_path_and_dash() {
        assert_eq!(command_base("-zsh"), "zsh");
        assert_eq!(command_base("/usr/local/bin/claude"), "claude");
        assert_eq!(command_base(" node "), "node");
    }

    #[test]
    fn children_detection() {
        let pm = make_pm(&[(10, 1, "zsh"), (11, 10, "node cli.js")]);
        assert!(has_children(10, &pm));
        assert!(!has_children(11, &pm));
    }

    #[test]
    fn descendants_deepest_first() {
        let pm = make_pm(&[
            (10, 1, "zsh"),
            (11, 10, "node"),
            (12, 11, "rg"),
            (13, 10, "sleep"),
            (99, 1, "unrelated"),
        ]);
        let d = descendants(10, &pm);
        assert_eq!(d.len(), 3);
        assert!(!d.contains(&10));
        assert!(!d.contains(&99));
        let pos = |pid| d.iter().position(|&p| p == pid).expect("present");
        assert!(pos(12) < pos(11), "grandchild before child: {d:?}");
    }

    #[test]
    fn terminate_empty_is_noop() {
        terminate(&[]);
    }
}
