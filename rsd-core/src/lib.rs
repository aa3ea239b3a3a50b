//! RaceStatusDisplay Core Library
//!
//! This crate provides the display data model and the provider trait that
//! race-host integrations implement to feed sensor and race telemetry.

pub mod model;
pub mod provider;
pub mod units;

pub use model::{
    Availability, DisplayMode, LapEvent, Quantity, RacePhase, RaceStatus, SensorEntry,
    SensorInventory, SensorReading, Standing, VoltageSnapshot,
};
pub use provider::TelemetryProvider;
