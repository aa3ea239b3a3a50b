//! Integration tests for the DemoProvider and DemoLapFeed

use rsd_adapters::{DemoLapFeed, DemoProvider, SensorFilter, TelemetryAdapter};
use rsd_core::model::{Availability, Quantity, RacePhase};
use rsd_core::TelemetryProvider;

#[test]
fn test_demo_provider_name() {
    let provider = DemoProvider::new();
    assert_eq!(provider.name(), "Demo");
}

#[test]
fn test_demo_provider_lists_sensors() {
    let mut provider = DemoProvider::new();
    let names = provider.sensor_names().unwrap().unwrap();
    assert_eq!(names, vec!["Battery", "Core", "Ambient"]);
}

#[test]
fn test_demo_unknown_sensor_is_error() {
    let mut provider = DemoProvider::new();
    assert!(provider.sensor_readings("Flux").is_err());
}

#[test]
fn test_demo_snapshot_skips_non_voltage_sensor() {
    let mut adapter = TelemetryAdapter::new(Box::new(DemoProvider::new()), SensorFilter::default());
    let snapshot = adapter.snapshot_voltage().expect("demo always has voltage");

    let names: Vec<&str> = snapshot.sensors.iter().map(|s| s.sensor_name.as_str()).collect();
    assert_eq!(names, vec!["Battery", "Core"]);

    let battery = &snapshot.sensors[0];
    assert_eq!(battery.primary().unwrap().quantity, Quantity::Voltage);
    assert_eq!(battery.secondary().unwrap().quantity, Quantity::Current);
    assert!(battery.reading(Quantity::Power).is_some());
}

#[test]
fn test_demo_ready_phase_has_no_results() {
    let mut adapter = TelemetryAdapter::new(
        Box::new(DemoProvider::frozen_at(10.0)),
        SensorFilter::default(),
    );
    let status = adapter.snapshot_race().unwrap();
    assert_eq!(status.phase, RacePhase::Ready);
    assert!(status.standings.is_none());
}

#[test]
fn test_demo_racing_waits_before_publishing_results() {
    let mut early = TelemetryAdapter::new(
        Box::new(DemoProvider::frozen_at(36.0)),
        SensorFilter::default(),
    );
    let status = early.snapshot_race().unwrap();
    assert_eq!(status.phase, RacePhase::Racing);
    assert!(status.standings.is_none());

    let mut later = TelemetryAdapter::new(
        Box::new(DemoProvider::frozen_at(80.0)),
        SensorFilter::default(),
    );
    match later.poll_race() {
        Availability::Available(status) => {
            let standings = status.standings.expect("results after the first laps");
            assert_eq!(standings.len(), 4);
            assert_eq!(standings[0].rank, 1);
            assert!(standings.iter().all(|s| s.display_name.chars().count() <= 6));
            assert!(standings.iter().all(|s| s.best_lap_time.starts_with("0:")));
        }
        other => panic!("expected race status, got {:?}", other),
    }
}

#[test]
fn test_demo_lap_feed_numbers_laps_per_pilot() {
    let laps: Vec<_> = DemoLapFeed::new().take(11).collect();
    assert_eq!(laps[0].lap_number, 1);
    assert_eq!(laps[4].lap_number, 1);
    assert_eq!(laps[5].lap_number, 2);
    assert_eq!(laps[10].lap_number, 3);
    assert_eq!(laps[1].position, Some(2));
}
