//! Reading records and the numeric parsing policy.
//!
//! A [`ReadingRecord`] is one row of a machine's history, kept exactly as it
//! was read from disk (trimmed text keyed by column name). Numbers are parsed
//! lazily by the snapshot builder through [`Measurement`], which makes the
//! permissive policy explicit: a field that is absent or not a number is
//! [`Measurement::Missing`], never an error.

use std::collections::HashMap;

/// Column names understood by the snapshot builder.
pub mod fields {
    pub const TEMPERATURE: &str = "temperature";
    pub const VIBRATION: &str = "vibration";
    pub const RPM: &str = "rpm";
    pub const LOAD: &str = "load";
    pub const PRESSURE: &str = "pressure";
    pub const HUMIDITY: &str = "humidity";
    pub const OIL_PCT: &str = "oil_pct";
    pub const COOLANT_PCT: &str = "coolant_pct";
    pub const HYDRAULIC_OIL_PCT: &str = "hydraulic_oil_pct";
    pub const BRAKE_FLUID_PCT: &str = "brake_fluid_pct";
    pub const FILTER_CLOG_PCT: &str = "filter_clog_pct";
    pub const BEARING_WEAR: &str = "bearing_wear";
    pub const DRIVE_BELT_WEAR: &str = "drive_belt_wear";
    pub const MOTOR_HEALTH_PCT: &str = "motor_health_pct";
    pub const EFFICIENCY_PCT: &str = "efficiency_pct";
    pub const USAGE_HOURS: &str = "usage_hours";

    /// Every column the builder reads, in wire order.
    pub const ALL: &[&str] = &[
        TEMPERATURE,
        VIBRATION,
        RPM,
        LOAD,
        PRESSURE,
        HUMIDITY,
        OIL_PCT,
        COOLANT_PCT,
        HYDRAULIC_OIL_PCT,
        BRAKE_FLUID_PCT,
        FILTER_CLOG_PCT,
        BEARING_WEAR,
        DRIVE_BELT_WEAR,
        MOTOR_HEALTH_PCT,
        EFFICIENCY_PCT,
        USAGE_HOURS,
    ];
}

/// Outcome of parsing one numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// A finite number.
    Value(f64),
    /// Field absent, empty, non-numeric or non-finite.
    Missing,
}

impl Measurement {
    /// Parse trimmed field text.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Value(v),
            _ => Self::Missing,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Missing => None,
        }
    }

    /// Collapse to a float, with `Missing` becoming NaN.
    ///
    /// NaN compares false against every threshold, so a missing field can
    /// never trigger a status or anomaly rule on its own.
    pub fn or_nan(self) -> f64 {
        self.value().unwrap_or(f64::NAN)
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// One historical row for a machine. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingRecord {
    fields: HashMap<String, String>,
}

impl ReadingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(column, text)` pairs. Text is trimmed.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.as_ref().trim().to_string()))
            .collect();
        Self { fields }
    }

    /// Raw trimmed text for a column, if the column exists.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Parse a column as a float measurement.
    pub fn measure(&self, name: &str) -> Measurement {
        self.raw(name)
            .map(Measurement::parse)
            .unwrap_or(Measurement::Missing)
    }

    /// Parse a column as a float, NaN when missing.
    pub fn float(&self, name: &str) -> f64 {
        self.measure(name).or_nan()
    }

    /// Parse a column as an integer.
    ///
    /// Integral text parses directly; decimal text is truncated toward zero.
    /// Anything else is `None`.
    pub fn integer(&self, name: &str) -> Option<i64> {
        let text = self.raw(name)?;
        if let Ok(v) = text.parse::<i64>() {
            return Some(v);
        }
        match Measurement::parse(text) {
            Measurement::Value(v) if v.abs() < i64::MAX as f64 => Some(v.trunc() as i64),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
