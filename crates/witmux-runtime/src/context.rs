//! Shared runtime state built from global CLI flags.

use std::sync::Arc;

use anyhow::Context as _;
use witmux_core::{NudgeLocks, SessionBackend};
use witmux_witness::{
    BackendOptions, ConfiguredStartup, WitnessConfig, WitnessManager, backend_kind_from_env,
    build_backend,
};

use crate::cli::Cli;

pub struct Context {
    pub backend: Arc<dyn SessionBackend>,
    pub locks: Arc<NudgeLocks>,
    pub config: WitnessConfig,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config = WitnessConfig::load_or_default(cli.config.as_deref())
            .context("loading witness configuration")?;
        let kind = cli.backend.unwrap_or_else(backend_kind_from_env);
        let backend = build_backend(
            kind,
            &BackendOptions {
                tmux_socket: cli.tmux_socket.clone(),
            },
        );
        tracing::debug!(backend = %kind, rig = %config.rig.name, "runtime context ready");
        Ok(Self {
            backend,
            locks: Arc::new(NudgeLocks::new()),
            config,
        })
    }

    pub fn witness(&self) -> WitnessManager {
        WitnessManager::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.locks),
            self.config.clone(),
            Box::new(ConfiguredStartup::from_config(&self.config)),
        )
    }

    /// Fail early with a readable message when the daemon is unreachable.
    pub fn require_backend(&self) -> anyhow::Result<()> {
        if self.backend.is_available() {
            Ok(())
        } else {
            anyhow::bail!("{} is not available", self.backend.kind())
        }
    }
}
