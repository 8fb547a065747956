//! The broadcast loop: the only thing that drives ticks.

use std::sync::Arc;
use std::time::Duration;

use machinefeed_core::{FeedMessage, ReplayEngine, now_millis};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::registry::{ConnectionRegistry, Delivery, Frame};

/// Owns the replay engine and pushes one update per tick to the registry.
pub struct BroadcastLoop {
    engine: ReplayEngine,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl BroadcastLoop {
    /// `interval` below 1 ms is raised to 1 ms.
    pub fn new(engine: ReplayEngine, registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self {
            engine,
            registry,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Run one tick now: snapshot every machine, serialize once, fan out.
    pub fn tick(&mut self) -> Delivery {
        self.tick_at(now_millis())
    }

    pub fn tick_at(&mut self, timestamp: u64) -> Delivery {
        let batch = self.engine.tick(timestamp);
        let machines = batch.len();
        let frame = match FeedMessage::update(batch).to_json() {
            Ok(text) => Frame::from(text),
            Err(e) => {
                log::error!("tick {}: cannot serialize update: {e}", self.engine.ticks());
                return Delivery::default();
            }
        };

        let delivery = self.registry.broadcast(frame);
        log::debug!(
            "tick {}: {machines} machines -> {} consumer(s), {} dropped",
            self.engine.ticks(),
            delivery.delivered,
            delivery.dropped
        );
        delivery
    }

    /// Tick forever. The first tick fires one interval after start.
    pub async fn run(mut self) {
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }
}
