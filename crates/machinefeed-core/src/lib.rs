//! # machinefeed-core
//!
//! **Replay recorded machine sensor histories as live telemetry.**
//!
//! `machinefeed-core` holds everything about the fleet that is independent of
//! transport: loading histories, replay positions, and the rules that turn one
//! historical row into a telemetry snapshot.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use machinefeed_core::{FeedMessage, RecordStore, ReplayEngine, now_millis};
//!
//! let store = Arc::new(RecordStore::load("machine_feed").unwrap());
//! let mut engine = ReplayEngine::new(store);
//!
//! let batch = engine.tick(now_millis());
//! println!("{}", FeedMessage::update(batch).to_json().unwrap());
//! ```
//!
//! ## Architecture
//!
//! CSV files → [`RecordStore`] → [`CursorTable`] → [`snapshot`] rules → [`FeedMessage`]
//!
//! The store is immutable after load and shared behind an `Arc`. Replay
//! positions live in the [`ReplayEngine`], which is owned by whoever drives
//! ticks.

pub mod cursor;
pub mod feed;
pub mod record;
pub mod snapshot;
pub mod store;

pub use cursor::CursorTable;
pub use feed::{FeedMessage, MachineSummary, ReplayEngine, now_millis, roster};
pub use record::{Measurement, ReadingRecord};
pub use snapshot::{
    Anomaly, AnomalyKind, Consumables, Kpi, Sensors, Severity, Spares, Status, TelemetrySnapshot,
};
pub use store::{LoadError, MachineHistory, MachineId, RecordStore};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
