//! `SessionBackend` over the amux CLI.

use std::path::Path;
use std::time::Duration;

use witmux_core::{
    BackendKind, CliExecutor, CommandRunner, EnvironmentOverlay, SessionBackend,
    SessionDescriptor, SessionError,
};

use crate::json::{parse_session_info, parse_session_list};

const FALLBACK_SHELL: &str = "/bin/sh";

/// amux adapter.
///
/// amux has no keystroke injection and no per-session environment, so
/// [`SessionBackend::send_keys`], [`SessionBackend::set_environment`] and
/// [`SessionBackend::get_environment`] fail with
/// [`SessionError::CapabilityUnavailable`]. Creation-time environment works by
/// handing the `amux new` child a full inherited-plus-overlay environment.
/// `amux kill` already takes down the whole process tree, so
/// [`SessionBackend::destroy_session_with_processes`] is the same call.
/// There are no extended capabilities.
pub struct AmuxBackend<R = CliExecutor> {
    runner: R,
    shell: String,
}

impl AmuxBackend<CliExecutor> {
    pub fn new() -> Self {
        Self::with_runner(CliExecutor::new(BackendKind::Amux, "amux"))
    }
}

impl Default for AmuxBackend<CliExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> AmuxBackend<R> {
    /// The plain-shell command defaults to `$SHELL`, else `/bin/sh`.
    pub fn with_runner(runner: R) -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_SHELL.to_string());
        Self { runner, shell }
    }

    /// Command hosted by sessions created without one.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn new_args<'a>(name: &'a str, dir: &'a str, command: &'a str) -> Vec<&'a str> {
        let mut args = vec!["new", "-t", name];
        if !dir.is_empty() {
            args.extend(["-d", dir]);
        }
        args.extend(["--", command]);
        args
    }

    fn unsupported(&self, operation: String) -> SessionError {
        tracing::debug!(%operation, "amux capability unavailable");
        SessionError::capability(BackendKind::Amux, operation)
    }
}

impl<R: CommandRunner> SessionBackend for AmuxBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Amux
    }

    fn create_session(&self, name: &str, work_dir: &Path) -> Result<(), SessionError> {
        self.create_session_with_command(name, work_dir, &self.shell)
    }

    fn create_session_with_command(
        &self,
        name: &str,
        work_dir: &Path,
        command: &str,
    ) -> Result<(), SessionError> {
        let dir = work_dir.to_string_lossy();
        self.runner.run(&Self::new_args(name, &dir, command))?;
        tracing::info!(session = name, "created amux session");
        Ok(())
    }

    fn create_session_with_command_and_env(
        &self,
        name: &str,
        work_dir: &Path,
        command: &str,
        env: &EnvironmentOverlay,
    ) -> Result<(), SessionError> {
        let dir = work_dir.to_string_lossy();
        self.runner
            .run_with_env(&Self::new_args(name, &dir, command), env)?;
        tracing::info!(session = name, vars = env.len(), "created amux session with environment");
        Ok(())
    }

    fn destroy_session(&self, name: &str) -> Result<(), SessionError> {
        self.runner.run(&["kill", "-t", name])?;
        tracing::info!(session = name, "destroyed amux session");
        Ok(())
    }

    fn destroy_session_with_processes(&self, name: &str) -> Result<(), SessionError> {
        self.destroy_session(name)
    }

    fn session_exists(&self, name: &str) -> Result<bool, SessionError> {
        match self.runner.run(&["has", "-t", name]) {
            Ok(_) => Ok(true),
            Err(e) => {
                if !e.is_not_found() && !e.is_unavailable() {
                    tracing::debug!(session = name, error = %e, "amux has failed");
                }
                Ok(false)
            }
        }
    }

    fn list_session_names(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .list_session_details()?
            .into_iter()
            .map(|s| s.name)
            .collect())
    }

    fn list_session_details(&self) -> Result<Vec<SessionDescriptor>, SessionError> {
        let out = match self.runner.run(&["ls", "--json"]) {
            Ok(out) => out,
            Err(e) if e.is_unavailable() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(parse_session_list(&out)?
            .into_iter()
            .map(SessionDescriptor::from)
            .collect())
    }

    fn session_info(&self, name: &str) -> Result<Option<SessionDescriptor>, SessionError> {
        match self.runner.run(&["info", "-t", name, "--json"]) {
            Ok(out) => Ok(Some(parse_session_info(&out)?.into())),
            Err(e) if e.is_not_found() || e.is_unavailable() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_keys(&self, name: &str, text: &str) -> Result<(), SessionError> {
        Err(self.unsupported(format!("send_keys({name:?}, {text:?})")))
    }

    fn capture_pane(&self, name: &str, max_lines: u32) -> Result<String, SessionError> {
        let lines = max_lines.to_string();
        self.runner.run(&["capture", "-t", name, "--lines", &lines])
    }

    fn set_environment(&self, name: &str, key: &str, _value: &str) -> Result<(), SessionError> {
        Err(self.unsupported(format!("set_environment({name:?}, {key:?})")))
    }

    fn get_environment(&self, name: &str, key: &str) -> Result<String, SessionError> {
        Err(self.unsupported(format!("get_environment({name:?}, {key:?})")))
    }

    fn is_agent_alive(&self, name: &str) -> bool {
        match self.session_info(name) {
            Ok(info) => info.is_some_and(|i| i.alive),
            Err(e) => {
                tracing::debug!(session = name, error = %e, "liveness probe failed");
                false
            }
        }
    }

    fn session_idle(&self, name: &str) -> Option<Duration> {
        self.session_info(name).ok().flatten().and_then(|i| i.idle)
    }

    fn is_available(&self) -> bool {
        self.runner.run(&["ls"]).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use witmux_core::{HealthState, NudgeLocks, nudge};

    use super::*;

    type Reply = Box<dyn Fn(&[&str]) -> Result<String, SessionError> + Send + Sync>;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        args: Vec<String>,
        env: Option<EnvironmentOverlay>,
    }

    struct MockRunner {
        calls: Mutex<Vec<Call>>,
        reply: Reply,
    }

    impl MockRunner {
        fn new(reply: impl Fn(&[&str]) -> Result<String, SessionError> + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply: Box::new(reply),
            }
        }

        fn ok() -> Self {
            Self::new(|_| Ok(String::new()))
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls").clone()
        }

        fn record(&self, args: &[&str], env: Option<&EnvironmentOverlay>) {
            self.calls.lock().expect("calls").push(Call {
                args: args.iter().map(|s| s.to_string()).collect(),
                env: env.cloned(),
            });
        }
    }

    impl CommandRunner for MockRunner {
        fn run(&self, args: &[&str]) -> Result<String, SessionError> {
            self.record(args, None);
            (self.reply)(args)
        }

        fn run_with_env(&self, args: &[&str], env: &EnvironmentOverlay) -> Result<String, SessionError> {
            self.record(args, Some(env));
            (self.reply)(args)
        }
    }

    fn backend(runner: MockRunner) -> AmuxBackend<MockRunner> {
        AmuxBackend::with_runner(runner).with_shell("/bin/zsh")
    }

    fn argv(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn unavailable() -> SessionError {
        SessionError::BackendUnavailable {
            backend: BackendKind::Amux,
        }
    }

    fn assert_backend<T: SessionBackend>() {}

    #[test]
    fn satisfies_backend_contract() {
        assert_backend::<AmuxBackend>();
        assert_backend::<AmuxBackend<MockRunner>>();
    }

    #[test]
    fn no_extended_capabilities() {
        assert!(backend(MockRunner::ok()).extras().is_none());
    }

    #[test]
    fn create_args() {
        let b = backend(MockRunner::ok());
        b.create_session("s", Path::new("/work")).expect("create");
        b.create_session_with_command("t", Path::new(""), "claude").expect("create");
        let calls = b.runner().calls();
        assert_eq!(calls[0].args, argv(&["new", "-t", "s", "-d", "/work", "--", "/bin/zsh"]));
        assert_eq!(calls[1].args, argv(&["new", "-t", "t", "--", "claude"]));
        assert!(calls.iter().all(|c| c.env.is_none()));
    }

    #[test]
    fn create_with_env_uses_child_environment() {
        let b = backend(MockRunner::ok());
        let env = EnvironmentOverlay::from([("WITMUX_ROLE".to_string(), "witness".to_string())]);
        b.create_session_with_command_and_env("s", Path::new("/w"), "claude", &env)
            .expect("create");
        let call = &b.runner().calls()[0];
        assert_eq!(call.args, argv(&["new", "-t", "s", "-d", "/w", "--", "claude"]));
        assert_eq!(call.env.as_ref(), Some(&env));
    }

    #[test]
    fn create_duplicate_is_session_exists() {
        let b = backend(MockRunner::new(|_| Err(SessionError::SessionExists)));
        let err = b.create_session("s", Path::new("/")).unwrap_err();
        assert!(matches!(err, SessionError::SessionExists));
    }

    #[test]
    fn destroy_variants_are_the_same_call() {
        let b = backend(MockRunner::ok());
        b.destroy_session("s").expect("destroy");
        b.destroy_session_with_processes("s").expect("destroy");
        let calls = b.runner().calls();
        assert_eq!(calls[0].args, argv(&["kill", "-t", "s"]));
        assert_eq!(calls[0].args, calls[1].args);
    }

    #[test]
    fn exists_hides_not_found_and_no_daemon() {
        let b = backend(MockRunner::ok());
        assert!(b.session_exists("s").expect("exists"));

        let b = backend(MockRunner::new(|_| Err(SessionError::SessionNotFound)));
        assert!(!b.session_exists("s").expect("no error"));

        let b = backend(MockRunner::new(|_| Err(unavailable())));
        assert!(!b.session_exists("s").expect("no error"));
    }

    #[test]
    fn list_parses_json() {
        let b = backend(MockRunner::new(|_| {
            Ok(r#"[{"name":"a","command":"claude","alive":true},{"name":"b"}]"#.into())
        }));
        assert_eq!(b.list_session_names().expect("list"), vec!["a", "b"]);
        assert!(b.session_set().expect("set").has("b"));
        assert_eq!(b.runner().calls()[0].args, argv(&["ls", "--json"]));
    }

    #[test]
    fn list_without_daemon_is_empty() {
        let b = backend(MockRunner::new(|_| Err(unavailable())));
        assert!(b.list_session_names().expect("list").is_empty());
        assert!(b.list_session_details().expect("details").is_empty());
    }

    #[test]
    fn list_bad_json_is_parse_error() {
        let b = backend(MockRunner::new(|_| Ok("{".into())));
        assert!(matches!(b.list_session_names(), Err(SessionError::Parse { .. })));
    }

    #[test]
    fn unsupported_operations_name_themselves() {
        let b = backend(MockRunner::ok());

        let err = b.send_keys("s", "hello").unwrap_err();
        match &err {
            SessionError::CapabilityUnavailable { backend, operation } => {
                assert_eq!(*backend, BackendKind::Amux);
                assert_eq!(operation, r#"send_keys("s", "hello")"#);
            }
            other => panic!("expected CapabilityUnavailable, got {other:?}"),
        }

        let err = b.set_environment("s", "KEY", "secret").unwrap_err();
        assert!(err.to_string().contains(r#"set_environment("s", "KEY")"#), "{err}");
        assert!(!err.to_string().contains("secret"));

        let err = b.get_environment("s", "KEY").unwrap_err();
        assert!(matches!(err, SessionError::CapabilityUnavailable { .. }));

        assert!(b.runner().calls().is_empty(), "unsupported ops must not shell out");
    }

    #[test]
    fn nudge_surfaces_capability_error() {
        let b = backend(MockRunner::ok());
        let locks = NudgeLocks::new();
        let err = nudge(&b, &locks, "s", "hi", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, SessionError::CapabilityUnavailable { .. }));
        assert!(locks.acquire("s", Duration::from_millis(1)));
    }

    #[test]
    fn capture_args() {
        let b = backend(MockRunner::new(|_| Ok("line".into())));
        assert_eq!(b.capture_pane("s", 25).expect("capture"), "line");
        assert_eq!(
            b.runner().calls()[0].args,
            argv(&["capture", "-t", "s", "--lines", "25"])
        );
    }

    #[test]
    fn liveness_and_health_from_info() {
        let b = backend(MockRunner::new(|args| match args[0] {
            "has" => Ok(String::new()),
            _ => Ok(r#"{"name":"s","command":"claude","alive":true,"idle_seconds":600}"#.into()),
        }));
        assert!(b.is_agent_alive("s"));
        assert!(b.is_agent_running("s", &["claude"]));
        assert_eq!(b.session_idle("s"), Some(Duration::from_secs(600)));
        assert_eq!(b.check_session_health("s", Duration::from_secs(60)), HealthState::AgentHung);
        assert_eq!(b.check_session_health("s", Duration::ZERO), HealthState::SessionHealthy);
        assert!(b.runner().calls().iter().any(|c| c.args == argv(&["info", "-t", "s", "--json"])));
    }

    #[test]
    fn dead_agent() {
        let b = backend(MockRunner::new(|args| match args[0] {
            "has" => Ok(String::new()),
            _ => Ok(r#"{"name":"s","alive":false}"#.into()),
        }));
        assert!(!b.is_agent_alive("s"));
        assert_eq!(b.check_session_health("s", Duration::ZERO), HealthState::AgentDead);
    }

    #[test]
    fn missing_session() {
        let b = backend(MockRunner::new(|_| Err(SessionError::SessionNotFound)));
        assert!(!b.is_agent_alive("s"));
        assert_eq!(b.session_info("s").expect("info"), None);
        assert_eq!(b.check_session_health("s", Duration::ZERO), HealthState::SessionDead);
    }

    #[test]
    fn availability_probe() {
        let b = backend(MockRunner::ok());
        assert!(b.is_available());
        assert_eq!(b.runner().calls()[0].args, argv(&["ls"]));

        let b = backend(MockRunner::new(|_| Err(unavailable())));
        assert!(!b.is_available());
    }
}
