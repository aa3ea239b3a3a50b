//! Host notification parsing
//!
//! The race host announces process start, process stop and recorded laps.
//! Lap payloads come in a few shapes (nested `lap` object or flat fields,
//! formatted or raw times); anything missing degrades to a placeholder
//! instead of rejecting the notification.

use rsd_core::model::LapEvent;
use rsd_core::units::{format_lap_millis, NOT_AVAILABLE};
use serde_json::Value;

const UNKNOWN_PILOT: &str = "Unknown";

/// A notification from the race host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Startup,
    Shutdown,
    LapRecorded(LapEvent),
}

impl HostEvent {
    /// Interpret a notification object keyed by its `event` field
    ///
    /// Returns `None` for notifications the display does not subscribe to.
    pub fn from_json(value: &Value) -> Option<Self> {
        let event = value.get("event")?.as_str()?.to_lowercase();
        match event.as_str() {
            "startup" => Some(HostEvent::Startup),
            "shutdown" => Some(HostEvent::Shutdown),
            "lap_recorded" | "race_lap_recorded" => {
                Some(HostEvent::LapRecorded(lap_event_from_payload(value)))
            }
            _ => None,
        }
    }

    /// Parse one line of newline-delimited JSON
    pub fn parse_line(line: &str) -> serde_json::Result<Option<Self>> {
        let value: Value = serde_json::from_str(line)?;
        Ok(Self::from_json(&value))
    }
}

/// Build a lap event from a lap-recorded payload, never failing
pub fn lap_event_from_payload(args: &Value) -> LapEvent {
    // Lap details live in a nested `lap` object when the host sends one
    let lap = args.get("lap").filter(|l| l.is_object()).unwrap_or(args);

    let lap_number = lap
        .get("lap_number")
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0);

    let formatted = lap
        .get("lap_time_formatted")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty() && *s != NOT_AVAILABLE);
    let lap_time_display = match formatted {
        Some(s) => s.to_string(),
        None => lap
            .get("lap_time")
            .and_then(Value::as_f64)
            .and_then(format_lap_millis)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    };

    let position = args
        .get("position")
        .or_else(|| lap.get("position"))
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok());

    LapEvent {
        pilot_display_name: pilot_name(args),
        lap_number,
        lap_time_display,
        position,
    }
}

fn pilot_name(args: &Value) -> String {
    let pilot = args.get("pilot").filter(|p| p.is_object()).unwrap_or(args);
    for key in ["callsign", "pilot_name", "name"] {
        if let Some(name) = pilot.get(key).and_then(Value::as_str) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    let id = args
        .get("pilot_id")
        .or_else(|| pilot.get("pilot_id"))
        .and_then(Value::as_u64);
    match id {
        Some(id) => format!("Pilot {}", id),
        None => UNKNOWN_PILOT.to_string(),
    }
}
