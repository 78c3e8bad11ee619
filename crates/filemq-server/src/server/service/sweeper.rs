//! In-process mover and reaper.
//!
//! Only started when `--sweep-interval-ms` is non-zero. Each tick promotes
//! settled files from `new`, requeues claims whose visibility timeout has
//! passed, and unlinks everything in `remove`. Every move is a single rename,
//! so several servers sweeping the same root (or an external daemon running
//! alongside) only ever skip each other's files.

use crate::server::config::SweepConfig;
use filemq::{Result, Store};
use std::sync::Arc;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub promoted: usize,
    pub requeued: usize,
    pub reaped: usize,
}

/// Runs one full sweep. Blocking.
pub fn sweep_once(store: &Store, config: &SweepConfig) -> Result<SweepReport> {
    let layout = store.layout();
    Ok(SweepReport {
        promoted: layout.promote_new(config.promote_after)?,
        requeued: layout.requeue_delayed(config.visibility_timeout)?,
        reaped: layout.reap()?,
    })
}

/// Spawns the periodic sweep. It stops once `shutdown_token` is cancelled.
pub fn spawn_sweeper(
    store: Arc<Store>,
    config: SweepConfig,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(?config, "Sweeper started");

        loop {
            tokio::select! {
                () = shutdown_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || sweep_once(&store, &config)).await {
                Ok(Ok(report)) if report != SweepReport::default() => {
                    tracing::debug!(?report, "Sweep complete");
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!("Sweep failed: {e}"),
                Err(e) => tracing::error!("Sweep task failed: {e}"),
            }
        }

        tracing::info!("Sweeper stopped");
    })
}
