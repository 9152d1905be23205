//! Backend selection.

use std::sync::Arc;

use witmux_amux::AmuxBackend;
use witmux_core::{BackendKind, SessionBackend};
use witmux_tmux::TmuxBackend;

/// `amux` selects amux; anything else, or unset, selects tmux.
pub const BACKEND_ENV: &str = "WITMUX_SESSION_BACKEND";

#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// tmux server socket name (`tmux -L`). Ignored by amux.
    pub tmux_socket: Option<String>,
}

pub fn backend_kind_from_env() -> BackendKind {
    BackendKind::from_selector(std::env::var(BACKEND_ENV).ok().as_deref())
}

pub fn build_backend(kind: BackendKind, opts: &BackendOptions) -> Arc<dyn SessionBackend> {
    tracing::debug!(backend = %kind, "selecting session backend");
    match kind {
        BackendKind::Tmux => match opts.tmux_socket.as_deref() {
            Some(socket) => Arc::new(TmuxBackend::with_socket_name(socket)),
            None => Arc::new(TmuxBackend::new()),
        },
        BackendKind::Amux => Arc::new(AmuxBackend::new()),
    }
}

pub fn backend_from_env() -> Arc<dyn SessionBackend> {
    build_backend(backend_kind_from_env(), &BackendOptions::default())
}
