//! Demo provider that generates synthetic race-host telemetry
//!
//! Cycles a race through ready, staging, racing and finished phases while a
//! battery slowly sags under load. Lets the display run without a timing
//! host attached.

use anyhow::{anyhow, Result};
use rsd_core::model::LapEvent;
use rsd_core::provider::{RawLapTime, RawReading, RawResult, TelemetryProvider};
use rsd_core::units::format_lap_millis;
use std::time::Instant;

// =============================================================================
// Race schedule
// =============================================================================

#[derive(Clone, Copy)]
struct PhaseSegment {
    code: i64,
    duration: f64, // seconds
}

/// Ready 30s, staging 5s, racing 90s, finished 30s
const SCHEDULE: [PhaseSegment; 4] = [
    PhaseSegment { code: 0, duration: 30.0 },
    PhaseSegment { code: 1, duration: 5.0 },
    PhaseSegment { code: 2, duration: 90.0 },
    PhaseSegment { code: 3, duration: 30.0 },
];

/// Results are not published until the first laps are in
const RESULTS_AFTER: f64 = 12.0;

const PILOTS: [(&str, f64); 5] = [
    ("Red5", 24_531.0),
    ("Maverick", 25_102.0),
    ("GoldLdr", 26_870.0),
    ("Ace", 27_415.0),
    ("Wedge", 29_990.0),
];

/// Race status code and seconds spent in that phase at `t` seconds into the cycle
fn phase_at(t: f64) -> (i64, f64) {
    let cycle: f64 = SCHEDULE.iter().map(|s| s.duration).sum();
    let mut t = t.rem_euclid(cycle);
    for segment in SCHEDULE {
        if t < segment.duration {
            return (segment.code, t);
        }
        t -= segment.duration;
    }
    (0, 0.0)
}

/// Battery voltage: 8.4V full, sagging towards 7.0V over an hour, with ripple
fn battery_voltage(t: f64) -> f64 {
    let sag = (t / 3600.0).min(1.0) * 1.4;
    8.4 - sag + 0.03 * (t * 0.7).sin()
}

fn battery_current(t: f64, racing: bool) -> f64 {
    let base = if racing { 2.4 } else { 1.1 };
    base + 0.2 * (t * 1.3).sin()
}

// =============================================================================
// Provider
// =============================================================================

/// Synthetic provider driven by wall-clock time since construction
pub struct DemoProvider {
    started: Instant,
    /// Fixed offset added to elapsed time (tests pin the schedule with it)
    offset: f64,
    frozen: bool,
}

impl DemoProvider {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            offset: 0.0,
            frozen: false,
        }
    }

    /// A provider pinned at `t` seconds into the race cycle
    pub fn frozen_at(t: f64) -> Self {
        Self {
            started: Instant::now(),
            offset: t,
            frozen: true,
        }
    }

    fn elapsed(&self) -> f64 {
        if self.frozen {
            self.offset
        } else {
            self.offset + self.started.elapsed().as_secs_f64()
        }
    }

    fn results_at(&self, t: f64) -> Option<Vec<RawResult>> {
        let (code, in_phase) = phase_at(t);
        if code != 2 || in_phase < RESULTS_AFTER {
            return None;
        }
        // Everyone finds a bit of pace as the race goes on
        let improvement = (in_phase / 90.0).min(1.0) * 400.0;
        let mut results: Vec<RawResult> = PILOTS
            .iter()
            .enumerate()
            .map(|(i, (callsign, base))| RawResult {
                callsign: Some(callsign.to_string()),
                name: None,
                pilot_id: Some(i as u32 + 1),
                fastest_lap: Some(if i % 2 == 0 {
                    RawLapTime::Millis(base - improvement * (1.0 + i as f64 * 0.1))
                } else {
                    format_lap_millis(base - improvement)
                        .map(RawLapTime::Formatted)
                        .unwrap_or(RawLapTime::Millis(*base))
                }),
            })
            .collect();
        results.sort_by(|a, b| lap_ms(a).total_cmp(&lap_ms(b)));
        Some(results)
    }
}

fn lap_ms(result: &RawResult) -> f64 {
    match &result.fastest_lap {
        Some(RawLapTime::Millis(ms)) => *ms,
        Some(RawLapTime::Formatted(s)) => parse_lap(s).unwrap_or(f64::MAX),
        None => f64::MAX,
    }
}

/// Parse `m:ss.mmm` back into milliseconds
fn parse_lap(s: &str) -> Option<f64> {
    let (minutes, seconds) = s.split_once(':')?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some((minutes * 60.0 + seconds) * 1000.0)
}

impl Default for DemoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryProvider for DemoProvider {
    fn name(&self) -> &str {
        "Demo"
    }

    fn sensor_names(&mut self) -> Result<Option<Vec<String>>> {
        Ok(Some(vec![
            "Battery".to_string(),
            "Core".to_string(),
            "Ambient".to_string(),
        ]))
    }

    fn sensor_readings(&mut self, sensor: &str) -> Result<Vec<RawReading>> {
        let t = self.elapsed();
        let racing = phase_at(t).0 == 2;
        match sensor {
            "Battery" => {
                let voltage = battery_voltage(t);
                let current = battery_current(t, racing);
                Ok(vec![
                    RawReading::new("voltage", voltage, "V"),
                    RawReading::new("current", current, "A"),
                    RawReading::new("power", voltage * current, "W"),
                ])
            }
            "Core" => Ok(vec![RawReading::new("voltage", 5.02 + 0.01 * (t * 2.1).sin(), "V")]),
            "Ambient" => Ok(vec![RawReading::new("temperature", 24.0, "C")]),
            other => Err(anyhow!("unknown sensor {}", other)),
        }
    }

    fn race_status(&mut self) -> Result<Option<i64>> {
        Ok(Some(phase_at(self.elapsed()).0))
    }

    fn race_results(&mut self) -> Result<Option<Vec<RawResult>>> {
        Ok(self.results_at(self.elapsed()))
    }
}

// =============================================================================
// Demo lap feed
// =============================================================================

/// Round-robin lap notices for the demo pilots, standing in for the host's
/// lap-recorded notifications
#[derive(Debug, Default)]
pub struct DemoLapFeed {
    count: u32,
}

impl DemoLapFeed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for DemoLapFeed {
    type Item = LapEvent;

    fn next(&mut self) -> Option<LapEvent> {
        let index = self.count as usize % PILOTS.len();
        let (callsign, base) = PILOTS[index];
        let lap_number = self.count / PILOTS.len() as u32 + 1;
        let jitter = f64::from(self.count % 7) * 113.0;
        self.count += 1;
        Some(LapEvent {
            pilot_display_name: callsign.to_string(),
            lap_number,
            lap_time_display: format_lap_millis(base + jitter).unwrap_or_default(),
            position: Some(index as u32 + 1),
        })
    }
}
