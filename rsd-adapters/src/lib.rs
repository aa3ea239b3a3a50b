//! Telemetry adapter, host event parsing and providers for RaceStatusDisplay

pub mod demo;
pub mod host;
pub mod memory;
pub mod telemetry;

pub use demo::{DemoLapFeed, DemoProvider};
pub use host::HostEvent;
pub use memory::{MemoryHandle, MemoryProvider};
pub use telemetry::{SensorFilter, TelemetryAdapter, TickSnapshot};
