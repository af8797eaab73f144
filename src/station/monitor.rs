//! Background health checks for the current station.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::resolver::StationResolver;

pub struct HealthMonitor;

impl HealthMonitor {
    /// Re-probe the current station every `interval` until `shutdown` fires.
    ///
    /// A failed probe clears the known-good state so the next dispatch
    /// rediscovers. Nothing is probed while no station is known.
    pub fn spawn(
        resolver: Arc<StationResolver>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => {
                        tracing::debug!("health monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        check_once(&resolver).await;
                    }
                }
            }
        })
    }
}

async fn check_once(resolver: &StationResolver) {
    let Some(record) = resolver.known() else {
        return;
    };
    if resolver.revalidate(&record.address).await {
        tracing::trace!(address = %record.address, "station healthy");
    } else {
        tracing::warn!(address = %record.address, "health check failed");
        resolver.invalidate_address(&record.address);
    }
}
