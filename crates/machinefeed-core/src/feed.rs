//! Replay engine and wire messages.
//!
//! [`ReplayEngine`] is the per-tick driver: it walks the store in load order,
//! advances each machine's cursor once, and builds one snapshot per machine.
//! [`FeedMessage`] is what goes over the wire, tagged by `type`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::cursor::CursorTable;
use crate::snapshot::{self, Status, TelemetrySnapshot};
use crate::store::{MachineId, RecordStore};

/// Roster entry sent to a consumer on connect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineSummary {
    #[serde(rename = "machineId")]
    pub machine_id: MachineId,
    pub status: Status,
}

/// A message on the consumer feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedMessage {
    /// Sent once, first, on every new connection.
    Init { machines: Vec<MachineSummary> },
    /// Sent once per tick with one snapshot per machine.
    Update { data: Vec<TelemetrySnapshot> },
}

impl FeedMessage {
    /// The connect-time roster: every machine, presumed `OFFLINE` until its
    /// first update arrives.
    pub fn init(store: &RecordStore) -> Self {
        Self::Init {
            machines: roster(store),
        }
    }

    pub fn update(data: Vec<TelemetrySnapshot>) -> Self {
        Self::Update { data }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Every machine in load order with the default `OFFLINE` status.
pub fn roster(store: &RecordStore) -> Vec<MachineSummary> {
    store
        .machine_ids()
        .map(|id| MachineSummary {
            machine_id: id.clone(),
            status: Status::Offline,
        })
        .collect()
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Owns the replay state for the whole fleet.
///
/// The store is shared read-only; the cursor table is owned exclusively, so
/// whoever holds the engine is the only writer of replay positions.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    store: Arc<RecordStore>,
    cursors: CursorTable,
    ticks: u64,
}

impl ReplayEngine {
    pub fn new(store: Arc<RecordStore>) -> Self {
        let cursors = CursorTable::new(&store);
        Self {
            store,
            cursors,
            ticks: 0,
        }
    }

    /// Run one tick: one snapshot per machine in store order, each cursor
    /// advanced exactly once.
    pub fn tick(&mut self, timestamp: u64) -> Vec<TelemetrySnapshot> {
        let mut batch = Vec::with_capacity(self.store.len());
        for machine in self.store.iter() {
            let Some(index) = self.cursors.advance(machine.id().as_str()) else {
                continue;
            };
            let record = &machine.records()[index];
            batch.push(snapshot::snapshot(machine.id(), record, timestamp));
        }
        self.ticks += 1;
        batch
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn cursors(&self) -> &CursorTable {
        &self.cursors
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
