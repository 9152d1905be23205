//! CommandRunner trait and CliExecutor (sync subprocess wrapper).
//!
//! Both adapters talk to their multiplexer through this boundary so tests can
//! inject a mock runner and assert on the exact argument vectors.

use std::process::{Command, Output};

use crate::classify::classify_failure;
use crate::env::build_env;
use crate::error::{ProcessError, SessionError};
use crate::types::{BackendKind, EnvironmentOverlay};

/// Executes multiplexer CLI commands. Enables mock injection for testing.
pub trait CommandRunner: Send + Sync {
    /// Run with the inherited environment; returns trimmed stdout.
    fn run(&self, args: &[&str]) -> Result<String, SessionError>;

    /// Run with a child environment of inherited variables overlaid by `env`.
    fn run_with_env(&self, args: &[&str], env: &EnvironmentOverlay)
    -> Result<String, SessionError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, SessionError> {
        (**self).run(args)
    }

    fn run_with_env(
        &self,
        args: &[&str],
        env: &EnvironmentOverlay,
    ) -> Result<String, SessionError> {
        (**self).run_with_env(args, env)
    }
}

/// Real executor using `std::process::Command`.
///
/// Each call spawns one process and waits for it; the executor holds no
/// child handles, so it is `Send + Sync`.
#[derive(Debug, Clone)]
pub struct CliExecutor {
    backend: BackendKind,
    bin: String,
    global_args: Vec<String>,
}

impl CliExecutor {
    pub fn new(backend: BackendKind, bin: impl Into<String>) -> Self {
        Self {
            backend,
            bin: bin.into(),
            global_args: Vec::new(),
        }
    }

    /// Arguments placed before every subcommand (e.g. tmux `-L name`).
    #[must_use]
    pub fn with_global_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn global_args(&self) -> &[String] {
        &self.global_args
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.global_args);
        cmd.args(args);
        cmd
    }

    fn finish(&self, args: &[&str], output: std::io::Result<Output>) -> Result<String, SessionError> {
        let subcommand = args.first().copied().unwrap_or_default();
        let output = output.map_err(|e| {
            classify_failure(self.backend, subcommand, "", ProcessError::Spawn(e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                backend = %self.backend,
                subcommand,
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                "multiplexer command failed"
            );
            return Err(classify_failure(
                self.backend,
                subcommand,
                &stderr,
                ProcessError::Exit(output.status),
            ));
        }
        // Leading whitespace is content (captured pane indentation).
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

impl CommandRunner for CliExecutor {
    fn run(&self, args: &[&str]) -> Result<String, SessionError> {
        tracing::trace!(backend = %self.backend, ?args, "run");
        let output = self.command(args).output();
        self.finish(args, output)
    }

    fn run_with_env(
        &self,
        args: &[&str],
        env: &EnvironmentOverlay,
    ) -> Result<String, SessionError> {
        tracing::trace!(backend = %self.backend, ?args, overlay = env.len(), "run with env");
        let mut cmd = self.command(args);
        cmd.env_clear().envs(build_env(env));
        let output = cmd.output();
        self.finish(args, output)
    }
}
