//! Display data model
//!
//! Normalized value types produced by the telemetry adapter and consumed by
//! the display controller. Nothing in here knows where the data came from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of standings rows that fit on the panel
pub const MAX_STANDINGS: usize = 4;

/// Physical quantity of a sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Voltage,
    Current,
    Power,
    Other,
}

impl Quantity {
    /// Classify a provider's quantity key (e.g. "voltage", "bus_voltage", "current")
    pub fn classify(key: &str) -> Self {
        let key = key.to_lowercase();
        if key.contains("voltage") {
            Quantity::Voltage
        } else if key.contains("current") {
            Quantity::Current
        } else if key.contains("power") {
            Quantity::Power
        } else {
            Quantity::Other
        }
    }
}

/// A single normalized sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Quantity key as reported by the provider
    pub name: String,
    pub quantity: Quantity,
    pub value: f64,
    pub unit: String,
}

/// All readings for one sensor within a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub sensor_name: String,
    pub readings: Vec<SensorReading>,
}

impl SensorEntry {
    /// First reading of the given quantity
    pub fn reading(&self, quantity: Quantity) -> Option<&SensorReading> {
        self.readings.iter().find(|r| r.quantity == quantity)
    }

    /// The sensor's main voltage: the reading keyed exactly `voltage`, else
    /// the first voltage-like one (`bus_voltage`, `shunt_voltage`, ...)
    pub fn voltage(&self) -> Option<&SensorReading> {
        self.readings
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case("voltage"))
            .or_else(|| self.reading(Quantity::Voltage))
    }

    /// The reading shown on the sensor's main line: voltage when present,
    /// otherwise whatever the provider listed first.
    pub fn primary(&self) -> Option<&SensorReading> {
        self.voltage().or_else(|| self.readings.first())
    }

    /// Current reading shown under the primary line, if any
    pub fn secondary(&self) -> Option<&SensorReading> {
        match self.primary() {
            Some(primary) if primary.quantity == Quantity::Current => None,
            _ => self.reading(Quantity::Current),
        }
    }
}

/// Sensor readings captured for one tick, in provider order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoltageSnapshot {
    pub sensors: Vec<SensorEntry>,
}

impl VoltageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Voltage of the first sensor that has one
    pub fn primary_voltage(&self) -> Option<&SensorReading> {
        self.sensors
            .iter()
            .find_map(SensorEntry::voltage)
    }
}

/// What the sensor subsystem looked like when no sensor qualified for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorInventory {
    /// The host has no sensor subsystem (yet)
    Absent,
    /// The subsystem exists but lists no sensors
    Empty,
    /// Sensors exist, none of them qualified
    Present { names: Vec<String> },
    /// Querying the subsystem failed
    Failed,
}

/// Race phase as reported by the timing host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacePhase {
    Ready,
    Staging,
    Racing,
    Finished,
}

impl RacePhase {
    /// Map the host's numeric status code (0 ready, 1 staging, 2 racing, 3 done)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RacePhase::Ready),
            1 => Some(RacePhase::Staging),
            2 => Some(RacePhase::Racing),
            3 => Some(RacePhase::Finished),
            _ => None,
        }
    }

    /// Staging and racing count as an active race
    pub fn is_active(self) -> bool {
        matches!(self, RacePhase::Staging | RacePhase::Racing)
    }

    /// Header text, `None` for a ready (idle) race
    pub fn header_text(self) -> Option<&'static str> {
        match self {
            RacePhase::Ready => None,
            RacePhase::Staging => Some("Race: Staging"),
            RacePhase::Racing => Some("Race: Running"),
            RacePhase::Finished => Some("Race: Finished"),
        }
    }
}

/// One row of the standings view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: u32,
    /// Already truncated for the standings layout
    pub display_name: String,
    /// Formatted best lap, or "N/A"
    pub best_lap_time: String,
}

/// Race status for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceStatus {
    pub phase: RacePhase,
    /// `None` until the host publishes results; at most [`MAX_STANDINGS`] rows
    pub standings: Option<Vec<Standing>>,
    /// Set when the phase was read but the results query failed
    pub results_failed: bool,
}

/// A lap-completion notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapEvent {
    pub pilot_display_name: String,
    pub lap_number: u32,
    pub lap_time_display: String,
    pub position: Option<u32>,
}

/// The four things the panel can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    VoltageMonitor,
    RaceStanding,
    LapNotice,
    BurnInGuard,
}

impl DisplayMode {
    /// Voltage monitor and burn-in guard are the idle modes
    pub fn is_idle(self) -> bool {
        matches!(self, DisplayMode::VoltageMonitor | DisplayMode::BurnInGuard)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayMode::VoltageMonitor => "voltage-monitor",
            DisplayMode::RaceStanding => "race-standing",
            DisplayMode::LapNotice => "lap-notice",
            DisplayMode::BurnInGuard => "burn-in-guard",
        };
        f.write_str(name)
    }
}

/// Outcome of polling one part of the provider
///
/// An absent provider is normal (the host may come up later); a failed one
/// is not, and the controller renders a placeholder for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Available(T),
    Unavailable,
    Failed,
}

impl<T> Availability<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Availability::Available(value) => Some(value),
            Availability::Unavailable | Availability::Failed => None,
        }
    }

    pub fn as_ref(&self) -> Availability<&T> {
        match self {
            Availability::Available(value) => Availability::Available(value),
            Availability::Unavailable => Availability::Unavailable,
            Availability::Failed => Availability::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Availability::Failed)
    }
}
