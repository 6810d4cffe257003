use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::orchestrator::RefreshOrchestrator;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Source of "refresh due" events. Injected into the refresh loop so tests
/// can drive cycles without real wall-clock delay; returning `false` ends
/// the loop.
pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = bool> + Send;
}

/// Production ticker: fires immediately once (the startup refresh), then at
/// a fixed period.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}

impl Ticker for IntervalTicker {
    fn tick(&mut self) -> impl Future<Output = bool> + Send {
        async {
            self.interval.tick().await;
            true
        }
    }
}

/// Runs a full refresh for every tick until the ticker ends. A failed cycle
/// is logged and retried at the next tick; nothing here escalates.
pub async fn run_scheduler<T: Ticker>(orchestrator: Arc<RefreshOrchestrator>, mut ticker: T) {
    while ticker.tick().await {
        debug!("scheduled refresh due");
        if let Err(err) = orchestrator.refresh_all().await {
            warn!("scheduled refresh failed: {err}");
        }
    }
    debug!("refresh ticker stopped");
}
