//! witmux-amux: amux session backend.
//!
//! amux is a socket-IPC multiplexer whose CLI reports sessions as JSON. It
//! covers less of [`witmux_core::SessionBackend`] than tmux; see
//! [`AmuxBackend`] for which operations are unavailable.

pub mod backend;
pub mod json;

pub use backend::AmuxBackend;
pub use json::AmuxSession;
