//! Periodic sweeper that rescues jobs whose worker crashed mid-execution.
//!
//! Without this loop, a job whose `last_heartbeat` goes stale would sit
//! `running` forever. It drives `JobStore::reclaim_expired`, shaped like
//! the same periodic-ticker loop as [`crate::scheduler::Scheduler`], but
//! deliberately *not* leader-gated: `reclaim_expired` is a conditional
//! `UPDATE ... WHERE status = 'running' AND last_heartbeat < ...`, safe
//! for every node in the fleet to run concurrently since a job already
//! reclaimed by one pass is no longer `running` for the next.

use crate::cancellation::CancellationToken;
use crate::store::JobStore;
use std::sync::Arc;
use std::time::Duration;

pub struct ReclaimerConfig {
    pub interval: Duration,
    pub lease_timeout: chrono::Duration,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            lease_timeout: chrono::Duration::seconds(90),
        }
    }
}

pub struct Reclaimer {
    store: Arc<dyn JobStore>,
    config: ReclaimerConfig,
}

impl Reclaimer {
    pub fn new(store: Arc<dyn JobStore>, config: ReclaimerConfig) -> Self {
        Self { store, config }
    }

    /// Runs until `shutdown` fires, reclaiming stale-leased jobs once per
    /// tick. Any failure is logged and retried next tick, matching the
    /// propagation policy of every other periodic loop in the system.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("reclaimer shutting down");
                    return;
                }
                _ = tick.tick() => {
                    match self.store.reclaim_expired(self.config.lease_timeout).await {
                        Ok(0) => {}
                        Ok(reclaimed) => tracing::warn!(reclaimed, "reclaimed jobs with stale leases"),
                        Err(err) => tracing::warn!(error = %err, "failed to reclaim stale-lease jobs"),
                    }
                }
            }
        }
    }
}
