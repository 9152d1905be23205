//! `SessionBackend` over the tmux CLI.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use witmux_core::{
    BackendKind, CliExecutor, CommandRunner, EnvironmentOverlay, SessionBackend,
    SessionDescriptor, SessionError, SessionExtras, SessionLabel,
};

use crate::format::{SESSION_FORMAT, parse_session_rows, parse_show_environment};
use crate::process::{self, ProcessMap};
use crate::theme;

/// Text shown by the agent when launched with permission checks disabled.
const BYPASS_WARNING: &str = "Bypass Permissions mode";

const BYPASS_SCAN_LINES: u32 = 30;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// tmux adapter.
///
/// Sessions are addressed with `=name` so tmux never falls back to prefix
/// matching. Liveness combines `pane_dead` with a process-table check: a
/// pane sitting in a bare shell only counts as alive while the shell has a
/// child.
pub struct TmuxBackend<R = CliExecutor> {
    runner: R,
    scan: fn() -> ProcessMap,
    poll_interval: Duration,
}

impl TmuxBackend<CliExecutor> {
    /// Talk to the default tmux server.
    pub fn new() -> Self {
        Self::with_runner(CliExecutor::new(BackendKind::Tmux, "tmux"))
    }

    /// Talk to the server on socket `name` (`tmux -L name`).
    pub fn with_socket_name(name: &str) -> Self {
        Self::with_runner(CliExecutor::new(BackendKind::Tmux, "tmux").with_global_args(["-L", name]))
    }

    /// Talk to the server at socket `path` (`tmux -S path`).
    pub fn with_socket_path(path: &Path) -> Self {
        let path = path.to_string_lossy().into_owned();
        Self::with_runner(CliExecutor::new(BackendKind::Tmux, "tmux").with_global_args(["-S".to_string(), path]))
    }
}

impl Default for TmuxBackend<CliExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> TmuxBackend<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            scan: process::scan_all_processes,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Replace the process-table snapshot used for liveness and teardown.
    #[must_use]
    pub fn with_process_scan(mut self, scan: fn() -> ProcessMap) -> Self {
        self.scan = scan;
        self
    }

    /// How often [`SessionExtras::wait_for_command`] polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn new_session(
        &self,
        name: &str,
        work_dir: &Path,
        command: Option<&str>,
        env: &EnvironmentOverlay,
    ) -> Result<(), SessionError> {
        let dir = work_dir.to_string_lossy();
        let pairs: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let mut args = vec!["new-session", "-d", "-s", name];
        if !dir.is_empty() {
            args.extend(["-c", &*dir]);
        }
        for pair in &pairs {
            args.extend(["-e", pair.as_str()]);
        }
        if let Some(command) = command {
            args.push(command);
        }
        self.runner.run(&args)?;
        tracing::info!(session = name, "created tmux session");
        Ok(())
    }

    /// Send tmux key names (`Enter`, `Down`, ...) rather than literal text.
    fn send_key_names(&self, name: &str, keys: &[&str]) -> Result<(), SessionError> {
        let target = pane_target(name);
        let mut args = vec!["send-keys", "-t", target.as_str()];
        args.extend_from_slice(keys);
        self.runner.run(&args).map(drop)
    }

    fn set_option(&self, name: &str, option: &str, value: &str) -> Result<(), SessionError> {
        let target = session_target(name);
        self.runner
            .run(&["set-option", "-t", &target, option, value])
            .map(drop)
    }
}

fn session_target(name: &str) -> String {
    format!("={name}")
}

fn pane_target(name: &str) -> String {
    format!("={name}:")
}

/// Last `max_lines` non-trailing-blank lines of `text`.
fn tail_lines(text: &str, max_lines: u32) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let skip = lines.len().saturating_sub(max_lines as usize);
    lines[skip..].join("\n")
}

impl<R: CommandRunner> SessionBackend for TmuxBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Tmux
    }

    fn create_session(&self, name: &str, work_dir: &Path) -> Result<(), SessionError> {
        self.new_session(name, work_dir, None, &EnvironmentOverlay::new())
    }

    fn create_session_with_command(
        &self,
        name: &str,
        work_dir: &Path,
        command: &str,
    ) -> Result<(), SessionError> {
        self.new_session(name, work_dir, Some(command), &EnvironmentOverlay::new())
    }

    fn create_session_with_command_and_env(
        &self,
        name: &str,
        work_dir: &Path,
        command: &str,
        env: &EnvironmentOverlay,
    ) -> Result<(), SessionError> {
        self.new_session(name, work_dir, Some(command), env)
    }

    fn destroy_session(&self, name: &str) -> Result<(), SessionError> {
        self.runner
            .run(&["kill-session", "-t", &session_target(name)])?;
        tracing::info!(session = name, "destroyed tmux session");
        Ok(())
    }

    fn destroy_session_with_processes(&self, name: &str) -> Result<(), SessionError> {
        if let Some(pid) = self.pane_pid(name)? {
            let tree = process::descendants(pid, &(self.scan)());
            if !tree.is_empty() {
                tracing::debug!(session = name, pane_pid = pid, count = tree.len(), "terminating pane processes");
                process::terminate(&tree);
            }
        }
        self.destroy_session(name)
    }

    fn session_exists(&self, name: &str) -> Result<bool, SessionError> {
        match self.runner.run(&["has-session", "-t", &session_target(name)]) {
            Ok(_) => Ok(true),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::debug!(session = name, error = %e, "has-session failed");
                }
                Ok(false)
            }
        }
    }

    fn list_session_names(&self) -> Result<Vec<String>, SessionError> {
        match self.runner.run(&["list-sessions", "-F", "#{session_name}"]) {
            Ok(out) => Ok(out
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.is_unavailable() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn list_session_details(&self) -> Result<Vec<SessionDescriptor>, SessionError> {
        let out = match self.runner.run(&["list-sessions", "-F", SESSION_FORMAT]) {
            Ok(out) => out,
            Err(e) if e.is_unavailable() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let now = Utc::now();
        Ok(parse_session_rows(&out, "list-sessions")?
            .into_iter()
            .map(|row| row.into_descriptor(now))
            .collect())
    }

    fn session_info(&self, name: &str) -> Result<Option<SessionDescriptor>, SessionError> {
        let target = pane_target(name);
        let out = match self
            .runner
            .run(&["display-message", "-p", "-t", &target, SESSION_FORMAT])
        {
            Ok(out) => out,
            Err(e) if e.is_not_found() || e.is_unavailable() => return Ok(None),
            Err(e) => return Err(e),
        };
        let now = Utc::now();
        Ok(parse_session_rows(&out, "display-message")?
            .into_iter()
            .next()
            .map(|row| row.into_descriptor(now)))
    }

    fn send_keys(&self, name: &str, text: &str) -> Result<(), SessionError> {
        let target = pane_target(name);
        self.runner
            .run(&["send-keys", "-t", &target, "-l", "--", text])
            .map(drop)
    }

    fn capture_pane(&self, name: &str, max_lines: u32) -> Result<String, SessionError> {
        let target = pane_target(name);
        let start = format!("-{max_lines}");
        let out = self
            .runner
            .run(&["capture-pane", "-p", "-S", &start, "-t", &target])?;
        Ok(tail_lines(&out, max_lines))
    }

    fn set_environment(&self, name: &str, key: &str, value: &str) -> Result<(), SessionError> {
        let target = session_target(name);
        self.runner
            .run(&["set-environment", "-t", &target, key, value])
            .map(drop)
    }

    fn get_environment(&self, name: &str, key: &str) -> Result<String, SessionError> {
        let target = session_target(name);
        let out = self
            .runner
            .run(&["show-environment", "-t", &target, key])?;
        parse_show_environment(key, &out).ok_or_else(|| SessionError::CommandFailed {
            backend: BackendKind::Tmux,
            subcommand: "show-environment".into(),
            stderr: format!("variable {key} is unset"),
        })
    }

    fn is_agent_alive(&self, name: &str) -> bool {
        let info = match self.session_info(name) {
            Ok(Some(info)) => info,
            Ok(None) => return false,
            Err(e) => {
                tracing::debug!(session = name, error = %e, "liveness probe failed");
                return false;
            }
        };
        if !info.alive {
            return false;
        }
        if !process::is_shell(&info.command) {
            return true;
        }
        info.pid
            .is_some_and(|pid| process::has_children(pid, &(self.scan)()))
    }

    fn session_idle(&self, name: &str) -> Option<Duration> {
        self.session_info(name).ok().flatten().and_then(|info| info.idle)
    }

    /// Checks the binary only. No running server is needed: the first
    /// `new-session` starts one.
    fn is_available(&self) -> bool {
        self.runner.run(&["-V"]).is_ok()
    }

    fn extras(&self) -> Option<&dyn SessionExtras> {
        Some(self)
    }
}

impl<R: CommandRunner> SessionExtras for TmuxBackend<R> {
    fn configure_session(&self, name: &str, label: &SessionLabel) -> Result<(), SessionError> {
        let theme = theme::assign_theme(&label.rig);
        self.set_option(name, "status-style", &theme.status_style())?;
        self.set_option(name, "status-left", &theme::status_left(&label.rig, &label.role))?;
        self.set_option(name, "status-left-length", "40")?;
        tracing::debug!(session = name, theme = theme.name, "configured session theme");
        Ok(())
    }

    fn wait_for_command(
        &self,
        name: &str,
        exclude: &[&str],
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let start = Instant::now();
        loop {
            let info = self.session_info(name)?.ok_or(SessionError::SessionNotFound)?;
            let base = process::command_base(&info.command);
            if !base.is_empty() && !exclude.iter().any(|e| base.eq_ignore_ascii_case(e)) {
                tracing::debug!(session = name, command = %info.command, "pane command ready");
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(SessionError::StartTimeout {
                    session: name.to_string(),
                    waited_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn accept_bypass_permissions_warning(&self, name: &str) -> Result<(), SessionError> {
        let screen = self.capture_pane(name, BYPASS_SCAN_LINES)?;
        if !screen.contains(BYPASS_WARNING) {
            return Ok(());
        }
        tracing::info!(session = name, "accepting bypass permissions warning");
        self.send_key_names(name, &["Down"])?;
        thread::sleep(self.poll_interval);
        self.send_key_names(name, &["Enter"])
    }

    fn pane_pid(&self, name: &str) -> Result<Option<u32>, SessionError> {
        match self.session_info(name)? {
            Some(info) => Ok(info.pid),
            None => Err(SessionError::SessionNotFound),
        }
    }
}
