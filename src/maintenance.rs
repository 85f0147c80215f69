//! Background store sweeper.
//!
//! Evicts expired transient records on a fixed cadence while the
//! server runs; saved records are never touched.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::server::AppState;

const DEFAULT_SWEEP_SECS: u64 = 300;

fn sweep_cadence() -> Duration {
    let secs = std::env::var("VITRIN_MAINTENANCE_TICK_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SWEEP_SECS);
    Duration::from_secs(secs.max(1))
}

/// Spawn the sweeper until shutdown is signaled.
pub fn spawn(state: Arc<AppState>, shutdown: Arc<Notify>) -> tokio::task::JoinHandle<()> {
    let cadence = sweep_cadence();
    tokio::spawn(async move {
        info!("store sweeper started: every {}s", cadence.as_secs());
        let mut ticker = tokio::time::interval(cadence);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("store sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = state.store.evict_expired().await;
                    if evicted > 0 {
                        info!("sweep evicted {evicted} expired record(s)");
                    }
                    if let Some(renderer) = &state.renderer {
                        debug!("browser contexts open: {}", renderer.active_contexts());
                    }
                }
            }
        }
    })
}
