use thiserror::Error;
use witmux_core::SessionError;

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("witness already running")]
    AlreadyRunning,

    #[error("witness not running")]
    NotRunning,

    /// The startup collaborator could not produce a command.
    #[error("resolving startup command: {0}")]
    Startup(String),

    #[error("invalid environment override {0:?}: expected KEY=VALUE")]
    InvalidOverride(String),

    #[error("killing zombie session")]
    KillZombie(#[source] SessionError),

    #[error("creating session")]
    CreateSession(#[source] SessionError),

    #[error("waiting for witness to start")]
    WaitForStart(#[source] SessionError),

    #[error(transparent)]
    Backend(#[from] SessionError),
}
