//! witmux-witness: supervisor for a rig's witness session.
//!
//! [`WitnessManager`] starts, stops and inspects the witness over any
//! [`witmux_core::SessionBackend`], recreating zombie sessions on start.
//! [`select`] picks the backend, [`config`] loads settings, and
//! [`restart::RestartTracker`] paces automatic recovery.

pub mod config;
pub mod error;
pub mod manager;
pub mod restart;
pub mod select;
pub mod startup;

pub use config::{ConfigError, WitnessConfig};
pub use error::WitnessError;
pub use manager::{SUPPORTED_SHELLS, WitnessManager, WitnessStatus, parse_overrides};
pub use restart::{RestartDecision, RestartPolicy, RestartState, RestartTracker};
pub use select::{BACKEND_ENV, BackendOptions, backend_from_env, backend_kind_from_env, build_backend};
pub use startup::{ConfiguredStartup, StartupContext, StartupPlan, StartupResolver};
