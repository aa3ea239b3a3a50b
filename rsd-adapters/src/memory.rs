//! In-memory provider whose contents are swapped through a shared handle
//!
//! Used by tests and by scripted feeds: the handle lives on one side, the
//! provider is moved into the display tick loop.

use anyhow::{anyhow, Result};
use rsd_core::provider::{RawReading, RawResult, TelemetryProvider};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// `None` models a host without a sensor subsystem
    sensors: Option<Vec<(String, Vec<RawReading>)>>,
    race_status: Option<i64>,
    results: Option<Vec<RawResult>>,
    failing_sensors: Vec<String>,
    fail_sensor_list: bool,
    fail_race_status: bool,
    fail_results: bool,
}

/// Handle used to change what a [`MemoryProvider`] reports
#[derive(Debug, Clone, Default)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enable the sensor subsystem with no sensors
    pub fn enable_sensors(&self) {
        let mut state = self.lock();
        if state.sensors.is_none() {
            state.sensors = Some(Vec::new());
        }
    }

    /// Add or replace a sensor, keeping first-insertion order
    pub fn set_sensor(&self, name: &str, readings: Vec<RawReading>) {
        let mut state = self.lock();
        let sensors = state.sensors.get_or_insert_with(Vec::new);
        match sensors.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = readings,
            None => sensors.push((name.to_string(), readings)),
        }
    }

    /// Remove the sensor subsystem entirely
    pub fn clear_sensors(&self) {
        self.lock().sensors = None;
    }

    pub fn set_race_status(&self, code: Option<i64>) {
        self.lock().race_status = code;
    }

    pub fn set_results(&self, results: Option<Vec<RawResult>>) {
        self.lock().results = results;
    }

    /// Make reads of one sensor fail
    pub fn fail_sensor(&self, name: &str) {
        self.lock().failing_sensors.push(name.to_string());
    }

    pub fn fail_sensor_list(&self, fail: bool) {
        self.lock().fail_sensor_list = fail;
    }

    pub fn fail_race_status(&self, fail: bool) {
        self.lock().fail_race_status = fail;
    }

    pub fn fail_results(&self, fail: bool) {
        self.lock().fail_results = fail;
    }
}

/// Provider backed by a [`MemoryHandle`]
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    handle: MemoryHandle,
}

impl MemoryProvider {
    pub fn new() -> (Self, MemoryHandle) {
        let handle = MemoryHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl TelemetryProvider for MemoryProvider {
    fn name(&self) -> &str {
        "Memory"
    }

    fn sensor_names(&mut self) -> Result<Option<Vec<String>>> {
        let state = self.handle.lock();
        if state.fail_sensor_list {
            return Err(anyhow!("sensor list unavailable"));
        }
        Ok(state
            .sensors
            .as_ref()
            .map(|sensors| sensors.iter().map(|(n, _)| n.clone()).collect()))
    }

    fn sensor_readings(&mut self, sensor: &str) -> Result<Vec<RawReading>> {
        let state = self.handle.lock();
        if state.failing_sensors.iter().any(|n| n == sensor) {
            return Err(anyhow!("sensor {} did not respond", sensor));
        }
        state
            .sensors
            .as_ref()
            .and_then(|sensors| sensors.iter().find(|(n, _)| n == sensor))
            .map(|(_, readings)| readings.clone())
            .ok_or_else(|| anyhow!("unknown sensor {}", sensor))
    }

    fn race_status(&mut self) -> Result<Option<i64>> {
        let state = self.handle.lock();
        if state.fail_race_status {
            return Err(anyhow!("race context unavailable"));
        }
        Ok(state.race_status)
    }

    fn race_results(&mut self) -> Result<Option<Vec<RawResult>>> {
        let state = self.handle.lock();
        if state.fail_results {
            return Err(anyhow!("results unavailable"));
        }
        Ok(state.results.clone())
    }
}
