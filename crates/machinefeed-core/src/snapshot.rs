//! Telemetry snapshot derivation.
//!
//! Pure functions from one [`ReadingRecord`] to the values a consumer sees:
//! a [`Status`] classification, at most one [`Anomaly`], and the grouped
//! numeric readings. Bad input never fails here; missing or non-numeric
//! fields come through as NaN (serialized as `null`).

use serde::Serialize;

use crate::record::{ReadingRecord, fields};
use crate::store::MachineId;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

pub const CRITICAL_TEMPERATURE: f64 = 100.0;
pub const CRITICAL_VIBRATION: f64 = 8.0;
pub const WARNING_TEMPERATURE: f64 = 90.0;
pub const WARNING_VIBRATION: f64 = 5.0;

pub const OVERHEATING_TEMPERATURE: f64 = 105.0;
pub const EXCESS_VIBRATION: f64 = 9.0;
pub const LOW_OIL_PCT: f64 = 10.0;
pub const MOTOR_WEAR_PCT: f64 = 40.0;

/// Synthetic power draw per unit of load. `power` is a proxy derived from
/// `load`, not a measured sensor value.
pub const POWER_PER_LOAD: f64 = 0.75;

// ---------------------------------------------------------------------------
// Classification types
// ---------------------------------------------------------------------------

/// Machine status as shown to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Operational,
    Warning,
    Critical,
    /// Only used in the connect-time roster.
    Offline,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operational => write!(f, "OPERATIONAL"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Anomaly severity. Ordered so consumers can aggregate with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

/// Anomaly category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnomalyKind {
    Overheating,
    Vibration,
    #[serde(rename = "Low Oil")]
    LowOil,
    #[serde(rename = "Motor Wear")]
    MotorWear,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overheating => write!(f, "Overheating"),
            Self::Vibration => write!(f, "Vibration"),
            Self::LowOil => write!(f, "Low Oil"),
            Self::MotorWear => write!(f, "Motor Wear"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Snapshot groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensors {
    pub temperature: f64,
    pub vibration: f64,
    pub rpm: Option<i64>,
    pub load: f64,
    pub pressure: f64,
    pub humidity: f64,
    /// `load * POWER_PER_LOAD`.
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumables {
    pub oil: f64,
    pub coolant: f64,
    pub hydraulic: f64,
    pub brake_fluid: f64,
    pub filter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spares {
    pub bearing_wear: f64,
    pub drive_belt_wear: f64,
    pub motor_health: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub efficiency: f64,
    pub usage_hours: f64,
}

/// Derived telemetry for one machine at one tick. Built fresh every tick and
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    #[serde(rename = "machineId")]
    pub machine_id: MachineId,
    /// Tick wall-clock time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub status: Status,
    pub sensors: Sensors,
    pub consumables: Consumables,
    pub spares: Spares,
    pub kpi: Kpi,
    pub anomaly: Option<Anomaly>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Classify a record by temperature and vibration. Critical is checked first.
pub fn status(record: &ReadingRecord) -> Status {
    classify(
        record.float(fields::TEMPERATURE),
        record.float(fields::VIBRATION),
    )
}

fn classify(temperature: f64, vibration: f64) -> Status {
    if temperature > CRITICAL_TEMPERATURE || vibration > CRITICAL_VIBRATION {
        Status::Critical
    } else if temperature > WARNING_TEMPERATURE || vibration > WARNING_VIBRATION {
        Status::Warning
    } else {
        Status::Operational
    }
}

/// First matching anomaly rule, in priority order.
pub fn anomaly(record: &ReadingRecord) -> Option<Anomaly> {
    let temperature = record.float(fields::TEMPERATURE);
    let vibration = record.float(fields::VIBRATION);

    if temperature > OVERHEATING_TEMPERATURE {
        return Some(Anomaly {
            kind: AnomalyKind::Overheating,
            severity: Severity::Critical,
            message: format!("High Temp: {temperature:.1}°C"),
        });
    }
    if vibration > EXCESS_VIBRATION {
        return Some(Anomaly {
            kind: AnomalyKind::Vibration,
            severity: Severity::Critical,
            message: format!("High Vibration: {vibration:.1}mm/s"),
        });
    }
    if record.float(fields::OIL_PCT) < LOW_OIL_PCT {
        return Some(Anomaly {
            kind: AnomalyKind::LowOil,
            severity: Severity::Warning,
            message: "Oil level critical".to_string(),
        });
    }
    if record.float(fields::MOTOR_HEALTH_PCT) < MOTOR_WEAR_PCT {
        return Some(Anomaly {
            kind: AnomalyKind::MotorWear,
            severity: Severity::Warning,
            message: "Motor health low".to_string(),
        });
    }
    None
}

/// Assemble the full snapshot for one machine.
pub fn snapshot(machine_id: &MachineId, record: &ReadingRecord, timestamp: u64) -> TelemetrySnapshot {
    let load = record.float(fields::LOAD);

    TelemetrySnapshot {
        machine_id: machine_id.clone(),
        timestamp,
        status: status(record),
        sensors: Sensors {
            temperature: record.float(fields::TEMPERATURE),
            vibration: record.float(fields::VIBRATION),
            rpm: record.integer(fields::RPM),
            load,
            pressure: record.float(fields::PRESSURE),
            humidity: record.float(fields::HUMIDITY),
            power: load * POWER_PER_LOAD,
        },
        consumables: Consumables {
            oil: record.float(fields::OIL_PCT),
            coolant: record.float(fields::COOLANT_PCT),
            hydraulic: record.float(fields::HYDRAULIC_OIL_PCT),
            brake_fluid: record.float(fields::BRAKE_FLUID_PCT),
            filter: record.float(fields::FILTER_CLOG_PCT),
        },
        spares: Spares {
            bearing_wear: record.float(fields::BEARING_WEAR),
            drive_belt_wear: record.float(fields::DRIVE_BELT_WEAR),
            motor_health: record.float(fields::MOTOR_HEALTH_PCT),
        },
        kpi: Kpi {
            efficiency: record.float(fields::EFFICIENCY_PCT),
            usage_hours: record.float(fields::USAGE_HOURS),
        },
        anomaly: anomaly(record),
    }
}
