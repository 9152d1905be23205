//! witmux-tmux: tmux session backend.
//!
//! Every operation is one `tmux` subprocess run through a
//! [`witmux_core::CommandRunner`], so tests drive the adapter with a mock
//! runner and assert on the exact argument vectors.

pub mod backend;
pub mod format;
pub mod process;
pub mod theme;

pub use backend::TmuxBackend;
pub use format::{SESSION_FORMAT, TmuxSessionRow, parse_session_rows};
pub use process::{SHELL_CMDS, is_shell};
pub use theme::{Theme, assign_theme};
