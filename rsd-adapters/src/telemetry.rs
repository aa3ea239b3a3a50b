//! Telemetry adapter
//!
//! Pulls sensor and race data from a [`TelemetryProvider`] and normalizes it
//! into the display model. A missing provider, a failing provider and a
//! provider with nothing to say all end up as values, never as errors.

use rsd_core::model::{
    Availability, Quantity, RacePhase, RaceStatus, SensorEntry, SensorInventory, SensorReading,
    Standing, VoltageSnapshot, MAX_STANDINGS,
};
use rsd_core::provider::{RawLapTime, RawResult, TelemetryProvider};
use rsd_core::units::{format_lap_millis, truncate_chars, NOT_AVAILABLE, STANDINGS_NAME_CHARS};
use tracing::{debug, warn};

/// Which sensors make it into a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFilter {
    /// Skip sensors that report no voltage reading
    pub voltage_only: bool,
    /// Skip sensors whose voltage does not exceed this value
    pub min_voltage: Option<f64>,
    /// When non-empty, only these sensor names are considered
    pub include: Vec<String>,
    /// Sensor names that are never shown
    pub exclude: Vec<String>,
}

impl Default for SensorFilter {
    fn default() -> Self {
        Self {
            voltage_only: true,
            min_voltage: None,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl SensorFilter {
    fn admits_name(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|n| n == name) {
            return false;
        }
        !self.exclude.iter().any(|n| n == name)
    }

    fn admits(&self, readings: &[SensorReading]) -> bool {
        if readings.is_empty() {
            return false;
        }
        let mut voltages = readings.iter().filter(|r| r.quantity == Quantity::Voltage).peekable();
        if voltages.peek().is_none() {
            return !self.voltage_only;
        }
        match self.min_voltage {
            None => true,
            Some(min) => voltages.any(|v| v.value > min),
        }
    }
}

/// Everything the controller reads from telemetry at the start of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickSnapshot {
    pub voltage: Availability<VoltageSnapshot>,
    /// Diagnostic inventory, meaningful when `voltage` is not available
    pub inventory: SensorInventory,
    pub race: Availability<RaceStatus>,
}

impl TickSnapshot {
    /// A snapshot with no provider at all
    pub fn empty() -> Self {
        Self {
            voltage: Availability::Unavailable,
            inventory: SensorInventory::Absent,
            race: Availability::Unavailable,
        }
    }
}

/// Normalizing front for a telemetry provider
pub struct TelemetryAdapter {
    provider: Option<Box<dyn TelemetryProvider>>,
    filter: SensorFilter,
}

impl TelemetryAdapter {
    pub fn new(provider: Box<dyn TelemetryProvider>, filter: SensorFilter) -> Self {
        Self {
            provider: Some(provider),
            filter,
        }
    }

    /// An adapter with no provider attached; every query reports unavailable
    pub fn detached(filter: SensorFilter) -> Self {
        Self {
            provider: None,
            filter,
        }
    }

    /// Attach (or replace) the provider once the host brings it up
    pub fn attach(&mut self, provider: Box<dyn TelemetryProvider>) {
        self.provider = Some(provider);
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    /// Voltage snapshot for this tick, `None` when nothing qualifies
    pub fn snapshot_voltage(&mut self) -> Option<VoltageSnapshot> {
        self.poll_voltage().0.into_option()
    }

    /// Race status for this tick, `None` when unknown
    pub fn snapshot_race(&mut self) -> Option<RaceStatus> {
        self.poll_race().into_option()
    }

    /// Read both voltage and race state for one tick
    pub fn snapshot(&mut self) -> TickSnapshot {
        let (voltage, inventory) = self.poll_voltage();
        let race = self.poll_race();
        TickSnapshot {
            voltage,
            inventory,
            race,
        }
    }

    /// Poll sensors, reporting why nothing qualified when that happens
    pub fn poll_voltage(&mut self) -> (Availability<VoltageSnapshot>, SensorInventory) {
        let Some(provider) = self.provider.as_mut() else {
            return (Availability::Unavailable, SensorInventory::Absent);
        };

        let names = match provider.sensor_names() {
            Ok(Some(names)) => names,
            Ok(None) => {
                debug!("No sensor system available");
                return (Availability::Unavailable, SensorInventory::Absent);
            }
            Err(e) => {
                warn!("Error listing sensors from {}: {}", provider.name(), e);
                return (Availability::Failed, SensorInventory::Failed);
            }
        };

        if names.is_empty() {
            debug!("Sensor system lists no sensors");
            return (Availability::Unavailable, SensorInventory::Empty);
        }

        let mut sensors = Vec::new();
        for name in &names {
            if !self.filter.admits_name(name) {
                continue;
            }
            let raw = match provider.sensor_readings(name) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("Error reading sensor {}: {}", name, e);
                    continue;
                }
            };
            let readings: Vec<SensorReading> = raw
                .into_iter()
                .filter(|r| r.value.is_finite())
                .map(|r| SensorReading {
                    quantity: Quantity::classify(&r.quantity),
                    name: r.quantity,
                    value: r.value,
                    unit: r.unit,
                })
                .collect();
            if self.filter.admits(&readings) {
                sensors.push(SensorEntry {
                    sensor_name: name.clone(),
                    readings,
                });
            }
        }

        if sensors.is_empty() {
            (Availability::Unavailable, SensorInventory::Present { names })
        } else {
            debug!("Read {} sensors", sensors.len());
            (
                Availability::Available(VoltageSnapshot { sensors }),
                SensorInventory::Present { names },
            )
        }
    }

    /// Poll race phase and, during an active race, the standings
    pub fn poll_race(&mut self) -> Availability<RaceStatus> {
        let Some(provider) = self.provider.as_mut() else {
            return Availability::Unavailable;
        };

        let phase = match provider.race_status() {
            Ok(Some(code)) => match RacePhase::from_code(code) {
                Some(phase) => phase,
                None => {
                    debug!("Unknown race status code {}", code);
                    return Availability::Unavailable;
                }
            },
            Ok(None) => return Availability::Unavailable,
            Err(e) => {
                warn!("Error getting race status from {}: {}", provider.name(), e);
                return Availability::Failed;
            }
        };

        let mut status = RaceStatus {
            phase,
            standings: None,
            results_failed: false,
        };

        if phase.is_active() {
            match provider.race_results() {
                Ok(Some(results)) => status.standings = Some(standings_from(&results)),
                Ok(None) => {}
                Err(e) => {
                    debug!("Error getting race results: {}", e);
                    status.results_failed = true;
                }
            }
        }

        Availability::Available(status)
    }
}

fn standings_from(results: &[RawResult]) -> Vec<Standing> {
    results
        .iter()
        .take(MAX_STANDINGS)
        .enumerate()
        .map(|(i, result)| Standing {
            rank: i as u32 + 1,
            display_name: truncate_chars(&pilot_label(result), STANDINGS_NAME_CHARS),
            best_lap_time: lap_label(result.fastest_lap.as_ref()),
        })
        .collect()
}

fn pilot_label(result: &RawResult) -> String {
    let non_empty = |s: &Option<String>| s.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
    non_empty(&result.callsign)
        .or_else(|| non_empty(&result.name))
        .unwrap_or_else(|| match result.pilot_id {
            Some(id) => format!("Pilot {}", id),
            None => "Pilot ?".to_string(),
        })
}

/// Pre-formatted strings are used verbatim; raw milliseconds become `m:ss.mmm`
pub fn lap_label(lap: Option<&RawLapTime>) -> String {
    match lap {
        Some(RawLapTime::Formatted(s)) if !s.is_empty() => s.clone(),
        Some(RawLapTime::Millis(ms)) => {
            format_lap_millis(*ms).unwrap_or_else(|| NOT_AVAILABLE.to_string())
        }
        _ => NOT_AVAILABLE.to_string(),
    }
}
