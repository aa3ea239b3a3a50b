//! Telemetry provider trait definition

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A raw reading as the host reports it: quantity key plus value and unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub quantity: String,
    pub value: f64,
    pub unit: String,
}

impl RawReading {
    pub fn new(quantity: &str, value: f64, unit: &str) -> Self {
        Self {
            quantity: quantity.to_string(),
            value,
            unit: unit.to_string(),
        }
    }
}

/// Best lap as published by the host: either already formatted or raw milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLapTime {
    Formatted(String),
    Millis(f64),
}

/// One entry of the host's race results, ordered by race time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub callsign: Option<String>,
    pub name: Option<String>,
    pub pilot_id: Option<u32>,
    pub fastest_lap: Option<RawLapTime>,
}

/// Trait for race-host telemetry providers
///
/// A provider is the boundary to whatever owns the sensors and the race
/// clock. Every call runs on the display tick and must return quickly.
pub trait TelemetryProvider: Send {
    /// Get the name of this provider (e.g., "Demo", "Memory")
    fn name(&self) -> &str;

    /// List sensor names in the host's insertion order
    ///
    /// Returns:
    /// - `Ok(Some(names))` when the sensor subsystem exists (possibly empty)
    /// - `Ok(None)` when there is no sensor subsystem
    /// - `Err(_)` if the query failed
    fn sensor_names(&mut self) -> Result<Option<Vec<String>>>;

    /// Read all current readings for one sensor
    fn sensor_readings(&mut self, sensor: &str) -> Result<Vec<RawReading>>;

    /// Current race status code (0 ready, 1 staging, 2 racing, 3 done)
    ///
    /// `Ok(None)` when there is no race context.
    fn race_status(&mut self) -> Result<Option<i64>>;

    /// Current results ordered by race time, `Ok(None)` until published
    fn race_results(&mut self) -> Result<Option<Vec<RawResult>>>;
}

impl<P: TelemetryProvider + ?Sized> TelemetryProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn sensor_names(&mut self) -> Result<Option<Vec<String>>> {
        (**self).sensor_names()
    }

    fn sensor_readings(&mut self, sensor: &str) -> Result<Vec<RawReading>> {
        (**self).sensor_readings(sensor)
    }

    fn race_status(&mut self) -> Result<Option<i64>> {
        (**self).race_status()
    }

    fn race_results(&mut self) -> Result<Option<Vec<RawResult>>> {
        (**self).race_results()
    }
}
