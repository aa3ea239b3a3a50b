//! Integration tests for the TelemetryAdapter against a MemoryProvider

use rsd_adapters::{MemoryHandle, MemoryProvider, SensorFilter, TelemetryAdapter};
use rsd_core::model::{Availability, RacePhase, SensorInventory};
use rsd_core::provider::{RawLapTime, RawReading, RawResult};

/// Helper: adapter over a fresh memory provider
fn adapter(filter: SensorFilter) -> (TelemetryAdapter, MemoryHandle) {
    let (provider, handle) = MemoryProvider::new();
    (TelemetryAdapter::new(Box::new(provider), filter), handle)
}

fn volts(v: f64) -> Vec<RawReading> {
    vec![RawReading::new("voltage", v, "V")]
}

// ==================== Sensors ====================

#[test]
fn test_detached_adapter_reports_absent() {
    let mut adapter = TelemetryAdapter::detached(SensorFilter::default());
    let snapshot = adapter.snapshot();
    assert_eq!(snapshot.voltage, Availability::Unavailable);
    assert_eq!(snapshot.inventory, SensorInventory::Absent);
    assert_eq!(snapshot.race, Availability::Unavailable);
    assert!(adapter.provider_name().is_none());
}

#[test]
fn test_attach_provider_later() {
    let mut adapter = TelemetryAdapter::detached(SensorFilter::default());
    let (provider, handle) = MemoryProvider::new();
    handle.set_sensor("Battery", volts(7.4));

    adapter.attach(Box::new(provider));

    assert_eq!(adapter.provider_name(), Some("Memory"));
    assert!(adapter.snapshot_voltage().is_some());
}

#[test]
fn test_sensor_order_follows_provider() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_sensor("Zeta", volts(5.0));
    handle.set_sensor("Alpha", volts(3.3));
    handle.set_sensor("Mid", volts(12.0));

    let snapshot = adapter.snapshot_voltage().unwrap();
    let names: Vec<&str> = snapshot.sensors.iter().map(|s| s.sensor_name.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
}

#[test]
fn test_empty_sensor_system() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.enable_sensors();

    let (voltage, inventory) = adapter.poll_voltage();
    assert_eq!(voltage, Availability::Unavailable);
    assert_eq!(inventory, SensorInventory::Empty);
}

#[test]
fn test_min_voltage_filter() {
    let (mut adapter, handle) = adapter(SensorFilter {
        min_voltage: Some(0.5),
        ..SensorFilter::default()
    });
    handle.set_sensor("Dead", volts(0.5));
    handle.set_sensor("Live", volts(0.51));

    let snapshot = adapter.snapshot_voltage().unwrap();
    assert_eq!(snapshot.sensors.len(), 1);
    assert_eq!(snapshot.sensors[0].sensor_name, "Live");
}

#[test]
fn test_min_voltage_checks_every_voltage_reading() {
    let (mut adapter, handle) = adapter(SensorFilter {
        min_voltage: Some(1.0),
        ..SensorFilter::default()
    });
    handle.set_sensor(
        "INA219",
        vec![
            RawReading::new("shunt_voltage", 0.02, "V"),
            RawReading::new("voltage", 7.4, "V"),
        ],
    );
    handle.set_sensor("Probe", vec![RawReading::new("shunt_voltage", 0.02, "V")]);

    let snapshot = adapter.snapshot_voltage().unwrap();
    assert_eq!(snapshot.sensors.len(), 1);
    let ina = &snapshot.sensors[0];
    assert_eq!(ina.sensor_name, "INA219");
    assert_eq!(ina.primary().map(|r| r.value), Some(7.4));
    assert_eq!(snapshot.primary_voltage().map(|r| r.value), Some(7.4));
}

#[test]
fn test_voltage_only_can_be_disabled() {
    let (mut adapter, handle) = adapter(SensorFilter {
        voltage_only: false,
        ..SensorFilter::default()
    });
    handle.set_sensor("Ambient", vec![RawReading::new("temperature", 24.0, "C")]);

    let snapshot = adapter.snapshot_voltage().unwrap();
    assert_eq!(snapshot.sensors[0].primary().unwrap().value, 24.0);
}

#[test]
fn test_non_finite_readings_dropped() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_sensor("Glitch", volts(f64::NAN));
    handle.set_sensor("Battery", volts(7.4));

    let snapshot = adapter.snapshot_voltage().unwrap();
    assert_eq!(snapshot.sensors.len(), 1);
    assert_eq!(snapshot.sensors[0].sensor_name, "Battery");
}

#[test]
fn test_sensor_list_failure_is_reported() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_sensor("Battery", volts(7.4));
    handle.fail_sensor_list(true);

    let (voltage, inventory) = adapter.poll_voltage();
    assert!(voltage.is_failed());
    assert_eq!(inventory, SensorInventory::Failed);
    assert!(adapter.snapshot_voltage().is_none());
}

#[test]
fn test_all_sensors_failing_lists_names() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_sensor("Battery", volts(7.4));
    handle.fail_sensor("Battery");

    let (voltage, inventory) = adapter.poll_voltage();
    assert_eq!(voltage, Availability::Unavailable);
    assert_eq!(
        inventory,
        SensorInventory::Present {
            names: vec!["Battery".to_string()]
        }
    );
}

// ==================== Race ====================

#[test]
fn test_race_status_codes() {
    let (mut adapter, handle) = adapter(SensorFilter::default());

    assert!(adapter.snapshot_race().is_none());

    handle.set_race_status(Some(0));
    assert_eq!(adapter.snapshot_race().unwrap().phase, RacePhase::Ready);

    handle.set_race_status(Some(3));
    assert_eq!(adapter.snapshot_race().unwrap().phase, RacePhase::Finished);

    handle.set_race_status(Some(42));
    assert!(adapter.snapshot_race().is_none());
}

#[test]
fn test_results_ignored_outside_active_race() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_race_status(Some(3));
    handle.set_results(Some(vec![RawResult {
        callsign: Some("Red5".to_string()),
        ..RawResult::default()
    }]));

    let status = adapter.snapshot_race().unwrap();
    assert!(status.standings.is_none());
}

#[test]
fn test_standings_formatting() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_race_status(Some(2));
    handle.set_results(Some(vec![
        RawResult {
            callsign: Some("Red5".to_string()),
            fastest_lap: Some(RawLapTime::Formatted("0:24.531".to_string())),
            ..RawResult::default()
        },
        RawResult {
            name: Some("Gold Leader".to_string()),
            fastest_lap: Some(RawLapTime::Millis(83_004.0)),
            ..RawResult::default()
        },
        RawResult {
            pilot_id: Some(12),
            fastest_lap: Some(RawLapTime::Millis(0.0)),
            ..RawResult::default()
        },
    ]));

    let standings = adapter.snapshot_race().unwrap().standings.unwrap();
    let rows: Vec<(u32, &str, &str)> = standings
        .iter()
        .map(|s| (s.rank, s.display_name.as_str(), s.best_lap_time.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, "Red5", "0:24.531"),
            (2, "Gold L", "1:23.004"),
            (3, "Pilot ", "N/A"),
        ]
    );
}

#[test]
fn test_race_status_failure() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.fail_race_status(true);
    assert!(adapter.poll_race().is_failed());
}

#[test]
fn test_results_failure_keeps_phase() {
    let (mut adapter, handle) = adapter(SensorFilter::default());
    handle.set_race_status(Some(2));
    handle.fail_results(true);

    let status = adapter.snapshot_race().unwrap();
    assert_eq!(status.phase, RacePhase::Racing);
    assert!(status.results_failed);
    assert!(status.standings.is_none());
}
