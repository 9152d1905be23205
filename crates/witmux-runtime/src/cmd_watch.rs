//! `witmux witness watch` — periodic health check with paced recovery.

use std::sync::Arc;
use std::time::Duration;

use witmux_core::HealthState;
use witmux_witness::{RestartDecision, RestartTracker, WitnessManager};

use crate::cli::WatchOpts;

/// What one watch tick decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    None,
    /// Hung, but hung restarts are disabled.
    Report,
    Restart,
    Wait { remaining_ms: u64 },
    HoldDown { remaining_ms: u64 },
}

pub fn plan_recovery(
    tracker: &mut RestartTracker,
    state: HealthState,
    restart_hung: bool,
    now_ms: u64,
) -> Recovery {
    match state {
        HealthState::SessionHealthy => {
            tracker.on_healthy();
            Recovery::None
        }
        HealthState::AgentHung if !restart_hung => Recovery::Report,
        HealthState::SessionDead | HealthState::AgentDead | HealthState::AgentHung => {
            match tracker.on_unhealthy(now_ms) {
                RestartDecision::Restart { .. } => Recovery::Restart,
                RestartDecision::Wait { remaining_ms } => Recovery::Wait { remaining_ms },
                RestartDecision::HoldDown { remaining_ms } => Recovery::HoldDown { remaining_ms },
            }
        }
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

pub async fn cmd_watch(
    witness: WitnessManager,
    opts: &WatchOpts,
    default_max_idle: Duration,
) -> anyhow::Result<()> {
    let settings = WatchSettings {
        interval: Duration::from_secs(opts.interval.max(1)),
        max_idle: opts.max_idle.map_or(default_max_idle, Duration::from_secs),
        restart_hung: opts.restart_hung,
    };
    watch_until(Arc::new(witness), &settings, shutdown_signal()).await
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub interval: Duration,
    pub max_idle: Duration,
    pub restart_hung: bool,
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            },
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                ctrl_c.await.ok();
                tracing::info!("received ctrl-c");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received ctrl-c");
    }
}

/// Check health every `interval` until `shutdown` resolves.
///
/// `shutdown` is polled across the whole loop, including while a blocking
/// health check or restart is in flight. An interrupted restart keeps
/// running on its blocking thread; the loop just stops waiting for it.
pub async fn watch_until<F>(
    witness: Arc<WitnessManager>,
    settings: &WatchSettings,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let mut tracker = RestartTracker::new(witness.config().restart.clone());
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(
        session = %witness.session_name(),
        interval_secs = settings.interval.as_secs(),
        max_idle_secs = settings.max_idle.as_secs(),
        restart_hung = settings.restart_hung,
        "watching witness"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = &mut shutdown => break,
        }

        let probe = Arc::clone(&witness);
        let max_idle = settings.max_idle;
        let state = tokio::select! {
            state = tokio::task::spawn_blocking(move || probe.health(max_idle)) => state?,
            () = &mut shutdown => break,
        };

        match plan_recovery(&mut tracker, state, settings.restart_hung, now_ms()) {
            Recovery::None => tracing::debug!(%state, "witness healthy"),
            Recovery::Report => tracing::warn!(%state, "witness hung; not restarting"),
            Recovery::Wait { remaining_ms } => {
                tracing::info!(%state, remaining_ms, "witness unhealthy; backing off");
            }
            Recovery::HoldDown { remaining_ms } => {
                tracing::error!(%state, remaining_ms, "restart budget exhausted; holding down");
            }
            Recovery::Restart => {
                tracing::warn!(%state, "restarting witness");
                let target = Arc::clone(&witness);
                let restarted = tokio::select! {
                    result = tokio::task::spawn_blocking(move || target.restart(None, &[])) => result?,
                    () = &mut shutdown => {
                        tracing::warn!("watch interrupted during restart");
                        break;
                    }
                };
                match restarted {
                    Ok(()) => tracing::info!("witness restarted"),
                    Err(e) => tracing::error!(error = %e, "witness restart failed"),
                }
            }
        }
    }
    tracing::info!("watch stopped");
    Ok(())
}
