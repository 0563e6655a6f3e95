use crate::message::Event;
use crate::Manager;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Publishes a global `Heartbeat` every `interval`.
pub struct HeartbeatSource {
    manager: Arc<Manager>,
    interval: Duration,
}

impl HeartbeatSource {
    pub fn new(manager: Arc<Manager>, interval: Duration) -> Self {
        Self {
            manager,
            // tokio intervals panic on a zero period
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting heartbeat source every {:?}", self.interval);

        // First beat one interval after start, not immediately.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.manager.publish_global(Event::Heartbeat),
            }
        }

        info!("Heartbeat source stopped");
    }
}
