//! Background liveness polling.
//!
//! `None` means no check has finished yet.

use crate::client::ExecutorClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period between checks; `tokio::time::interval` rejects zero
pub const MIN_HEALTH_INTERVAL: Duration = Duration::from_millis(10);

pub struct HealthMonitor {
    status: watch::Receiver<Option<bool>>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Check immediately, then every `interval`, until stopped or dropped
    ///
    /// Intervals below [`MIN_HEALTH_INTERVAL`] are raised to it.
    pub fn spawn(client: Arc<ExecutorClient>, interval: Duration) -> Self {
        if interval < MIN_HEALTH_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Health check interval too short, using minimum"
            );
        }
        let interval = interval.max(MIN_HEALTH_INTERVAL);

        let (tx, status) = watch::channel(None);
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let healthy = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    healthy = client.health_check() => healthy,
                };

                let changed = tx.send_if_modified(|current| {
                    if *current == Some(healthy) {
                        false
                    } else {
                        *current = Some(healthy);
                        true
                    }
                });
                if changed {
                    info!(base_url = client.base_url(), healthy = healthy, "Executor health changed");
                }
            }

            debug!("Health monitor stopped");
        });

        Self {
            status,
            token,
            handle,
        }
    }

    /// Most recent result
    pub fn latest(&self) -> Option<bool> {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.status.clone()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
