//! Per-mode frame layouts
//!
//! Each function draws one complete mode into an open [`Frame`]. Positions
//! are fixed for a 128x64 panel and scale off the frame's width and height
//! where the layout has a right or bottom edge.

use crate::surface::Frame;
use chrono::NaiveTime;
use rand::Rng;
use rsd_core::model::{
    Availability, LapEvent, Quantity, RaceStatus, SensorInventory, SensorReading, VoltageSnapshot,
};
use rsd_core::units::{format_value, strip_zero_minutes, truncate_chars};

const MARGIN_X: i32 = 5;

// Voltage monitor
const MONITOR_RULE_Y: i32 = 15;
const MONITOR_BODY_Y: i32 = 20;
const MONITOR_PITCH: i32 = 12;
const MONITOR_SENSOR_GAP: i32 = 2;
const FOOTER_FROM_BOTTOM: i32 = 12;
const DIAGNOSTIC_NAMES: usize = 2;

// Race standings
const STANDINGS_RULE_Y: i32 = 13;
const STANDINGS_BODY_Y: i32 = 16;
const STANDINGS_PITCH: i32 = 10;

// Lap notice
const NOTICE_RULE_Y: i32 = 13;
const NOTICE_BODY_Y: i32 = 18;
const NOTICE_PITCH: i32 = 12;

// Burn-in guard
const GUARD_MARGIN: i32 = 10;
const GUARD_RIGHT_RESERVE: i32 = 50;
const GUARD_BOTTOM_RESERVE: i32 = 20;

/// What ended up in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameContent {
    /// Live data
    Normal,
    /// A diagnostic or waiting message instead of data
    Placeholder,
    /// The two-string fallback used after repeated render failures
    Minimal,
    /// Nothing at all
    Blank,
}

/// Formatting options for sensor values
#[derive(Debug, Clone)]
pub struct ReadingStyle {
    pub show_current: bool,
    pub voltage_decimals: usize,
    pub current_decimals: usize,
}

impl ReadingStyle {
    fn format(&self, reading: &SensorReading) -> String {
        let decimals = match reading.quantity {
            Quantity::Current => self.current_decimals,
            Quantity::Power => 1,
            Quantity::Voltage | Quantity::Other => self.voltage_decimals,
        };
        format_value(reading.value, &reading.unit, decimals)
    }
}

// =============================================================================
// Voltage monitor
// =============================================================================

/// Sensor list with header and clock footer
pub fn voltage_monitor(
    frame: &mut Frame<'_>,
    header: &str,
    voltage: Availability<&VoltageSnapshot>,
    inventory: &SensorInventory,
    style: &ReadingStyle,
    clock: NaiveTime,
) -> FrameContent {
    frame.draw_text(MARGIN_X, 0, header);
    frame.draw_line(0, MONITOR_RULE_Y, frame.width(), MONITOR_RULE_Y);

    let footer_y = frame.height() - FOOTER_FROM_BOTTOM;
    let content = match voltage {
        Availability::Available(snapshot) if !snapshot.is_empty() => {
            let mut body = Body::new(MONITOR_PITCH, footer_y);
            sensor_lines(frame, &mut body, snapshot, style);
            FrameContent::Normal
        }
        _ => {
            let mut body = Body::new(frame.text_height(), footer_y);
            sensor_diagnostic(frame, &mut body, inventory);
            FrameContent::Placeholder
        }
    };

    frame.draw_text(MARGIN_X, footer_y, &clock.format("%H:%M:%S").to_string());
    content
}

/// Vertical cursor that refuses lines which would run into the footer
struct Body {
    y: i32,
    pitch: i32,
    limit: i32,
}

impl Body {
    fn new(pitch: i32, limit: i32) -> Self {
        Self {
            y: MONITOR_BODY_Y,
            pitch,
            limit,
        }
    }

    fn line(&mut self, frame: &mut Frame<'_>, x: i32, text: &str) -> bool {
        if self.y + frame.text_height() > self.limit {
            return false;
        }
        frame.draw_text(x, self.y, text);
        self.y += self.pitch;
        true
    }
}

fn sensor_lines(
    frame: &mut Frame<'_>,
    body: &mut Body,
    snapshot: &VoltageSnapshot,
    style: &ReadingStyle,
) {
    for sensor in &snapshot.sensors {
        let Some(primary) = sensor.primary() else {
            continue;
        };
        let text = format!("{}: {}", sensor.sensor_name, style.format(primary));
        if !body.line(frame, MARGIN_X, &text) {
            return;
        }
        if style.show_current {
            if let Some(current) = sensor.secondary() {
                let text = format!("  I: {}", style.format(current));
                if !body.line(frame, MARGIN_X, &text) {
                    return;
                }
            }
        }
        body.y += MONITOR_SENSOR_GAP;
    }
}

fn sensor_diagnostic(frame: &mut Frame<'_>, body: &mut Body, inventory: &SensorInventory) {
    body.line(frame, MARGIN_X, "No voltage sensors");
    match inventory {
        SensorInventory::Present { names } => {
            body.line(frame, MARGIN_X, &format!("Sensors: {}", names.len()));
            let columns = ((frame.width() - MARGIN_X) / frame.char_width()).max(0) as usize;
            for name in names.iter().take(DIAGNOSTIC_NAMES) {
                let text = truncate_chars(&format!("  {}", name), columns);
                if !body.line(frame, MARGIN_X, &text) {
                    break;
                }
            }
        }
        SensorInventory::Empty => {
            body.line(frame, MARGIN_X, "No sensors found");
        }
        SensorInventory::Absent => {
            body.line(frame, MARGIN_X, "Sensor system");
            body.line(frame, MARGIN_X, "not available");
        }
        SensorInventory::Failed => {
            body.line(frame, MARGIN_X, "Sensor error");
        }
    }
}

// =============================================================================
// Race standings
// =============================================================================

/// Standings for an active race, or a waiting message
///
/// `status` is `None` when the race was active on an earlier tick but could
/// not be read on this one.
pub fn race_standing(frame: &mut Frame<'_>, status: Option<&RaceStatus>) -> FrameContent {
    let header = status
        .and_then(|s| s.phase.header_text())
        .unwrap_or("Race Active");
    frame.draw_text(MARGIN_X, 0, header);
    frame.draw_line(0, STANDINGS_RULE_Y, frame.width(), STANDINGS_RULE_Y);

    let standings = status
        .and_then(|s| s.standings.as_deref())
        .filter(|rows| !rows.is_empty());

    let mut y = STANDINGS_BODY_Y;
    if let Some(rows) = standings {
        for row in rows {
            let text = format!(
                "{}.{} {}",
                row.rank,
                row.display_name,
                strip_zero_minutes(&row.best_lap_time)
            );
            frame.draw_text(MARGIN_X, y, &text);
            y += STANDINGS_PITCH;
        }
        return FrameContent::Normal;
    }

    let (first, second) = if status.is_some_and(|s| s.results_failed) {
        ("Race in progress", "Monitoring laps...")
    } else {
        ("Waiting for", "race data...")
    };
    frame.draw_text(MARGIN_X, y, first);
    frame.draw_text(MARGIN_X, y + STANDINGS_PITCH, second);
    FrameContent::Placeholder
}

// =============================================================================
// Lap notice
// =============================================================================

pub fn lap_notice(frame: &mut Frame<'_>, lap: &LapEvent) -> FrameContent {
    frame.draw_text(MARGIN_X, 0, "LAP COMPLETED");
    frame.draw_line(0, NOTICE_RULE_Y, frame.width(), NOTICE_RULE_Y);

    let mut lines = vec![
        format!("Pilot: {}", lap.pilot_display_name),
        format!("Lap: {}", lap.lap_number),
        format!("Time: {}", lap.lap_time_display),
    ];
    if let Some(position) = lap.position {
        lines.push(format!("Position: {}", position));
    }

    let mut y = NOTICE_BODY_Y;
    for line in &lines {
        frame.draw_text(MARGIN_X, y, line);
        y += NOTICE_PITCH;
    }
    FrameContent::Normal
}

// =============================================================================
// Burn-in guard
// =============================================================================

/// Two short strings at fresh random positions
///
/// The reading goes somewhere in the upper half of the safe area, the clock
/// somewhere in the lower half, so the two never overlap.
pub fn burn_in_guard<R: Rng + ?Sized>(
    frame: &mut Frame<'_>,
    voltage: Option<&SensorReading>,
    clock: NaiveTime,
    rng: &mut R,
) -> FrameContent {
    let reading = voltage
        .map(|v| format_value(v.value, &v.unit, 1))
        .unwrap_or_else(|| "No Data".to_string());
    let time = clock.format("%H:%M").to_string();

    let max_x = (frame.width() - GUARD_RIGHT_RESERVE).max(GUARD_MARGIN);
    let max_y = (frame.height() - GUARD_BOTTOM_RESERVE).max(GUARD_MARGIN);
    let mid_y = max_y / 2;

    let vx = pick(rng, GUARD_MARGIN, max_x);
    let vy = pick(rng, GUARD_MARGIN, mid_y);
    let tx = pick(rng, GUARD_MARGIN, max_x);
    let ty = pick(rng, mid_y + GUARD_MARGIN, max_y);

    frame.draw_text(vx, vy, &reading);
    frame.draw_text(tx, ty, &time);
    if voltage.is_some() {
        FrameContent::Normal
    } else {
        FrameContent::Placeholder
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, low: i32, high: i32) -> i32 {
    if high <= low {
        low
    } else {
        rng.random_range(low..=high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MemoryPanel, MemoryPanelHandle, RenderSurface};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rsd_core::model::{RacePhase, SensorEntry, Standing};

    fn surface() -> (RenderSurface, MemoryPanelHandle) {
        let (panel, handle) = MemoryPanel::new(128, 64);
        (RenderSurface::open(Box::new(panel), "6x10").unwrap(), handle)
    }

    fn style() -> ReadingStyle {
        ReadingStyle {
            show_current: true,
            voltage_decimals: 2,
            current_decimals: 1,
        }
    }

    fn reading(name: &str, value: f64, unit: &str) -> SensorReading {
        SensorReading {
            name: name.to_string(),
            quantity: Quantity::classify(name),
            value,
            unit: unit.to_string(),
        }
    }

    fn clock() -> NaiveTime {
        NaiveTime::from_hms_opt(14, 5, 9).unwrap()
    }

    #[test]
    fn test_monitor_stops_before_footer() {
        let (mut surface, handle) = surface();
        let snapshot = VoltageSnapshot {
            sensors: (0..4)
                .map(|i| SensorEntry {
                    sensor_name: format!("S{}", i),
                    readings: vec![reading("voltage", 5.0, "V"), reading("current", 0.5, "A")],
                })
                .collect(),
        };
        let mut frame = surface.begin_frame();
        let content = voltage_monitor(
            &mut frame,
            "Voltage Monitor",
            Availability::Available(&snapshot),
            &SensorInventory::Absent,
            &style(),
            clock(),
        );
        frame.commit().unwrap();

        assert_eq!(content, FrameContent::Normal);
        let last = handle.last_frame().unwrap();
        assert_eq!(
            last.texts(),
            vec!["Voltage Monitor", "S0: 5.00V", "  I: 0.5A", "14:05:09"]
        );
        assert_eq!(last.position_of("14:05:09"), Some((5, 52)));
    }

    #[test]
    fn test_monitor_lists_present_sensor_names() {
        let (mut surface, handle) = surface();
        let inventory = SensorInventory::Present {
            names: vec!["Temp".into(), "Fan".into(), "Aux".into()],
        };
        let mut frame = surface.begin_frame();
        let content = voltage_monitor(
            &mut frame,
            "Voltage Monitor",
            Availability::Unavailable,
            &inventory,
            &style(),
            clock(),
        );
        frame.commit().unwrap();

        assert_eq!(content, FrameContent::Placeholder);
        let last = handle.last_frame().unwrap();
        assert!(last.contains_text("No voltage sensors"));
        assert!(last.contains_text("Sensors: 3"));
        assert_eq!(last.position_of("  Temp"), Some((5, 40)));
        // No room for a second name above the footer in a 10px font
        assert!(!last.contains_text("  Fan"));
    }

    #[test]
    fn test_present_sensor_names_get_own_lines_and_fit_width() {
        let (panel, handle) = MemoryPanel::new(128, 64);
        let mut surface = RenderSurface::open(Box::new(panel), "5x8").unwrap();
        let inventory = SensorInventory::Present {
            names: vec![
                "Chassis temperature sensor".into(),
                "Fan".into(),
                "Aux".into(),
            ],
        };
        let mut frame = surface.begin_frame();
        voltage_monitor(
            &mut frame,
            "Voltage Monitor",
            Availability::Unavailable,
            &inventory,
            &style(),
            clock(),
        );
        frame.commit().unwrap();

        let last = handle.last_frame().unwrap();
        assert_eq!(
            last.texts(),
            vec![
                "Voltage Monitor",
                "No voltage sensors",
                "Sensors: 3",
                "  Chassis temperature se",
                "  Fan",
                "14:05:09",
            ]
        );
        assert_eq!(last.position_of("  Fan"), Some((5, 44)));
    }

    #[test]
    fn test_standings_strip_zero_minutes() {
        let (mut surface, handle) = surface();
        let status = RaceStatus {
            phase: RacePhase::Racing,
            standings: Some(vec![
                Standing {
                    rank: 1,
                    display_name: "Red5".into(),
                    best_lap_time: "0:24.531".into(),
                },
                Standing {
                    rank: 2,
                    display_name: "Maveri".into(),
                    best_lap_time: "1:02.004".into(),
                },
            ]),
            results_failed: false,
        };
        let mut frame = surface.begin_frame();
        race_standing(&mut frame, Some(&status));
        frame.commit().unwrap();

        let last = handle.last_frame().unwrap();
        assert_eq!(
            last.texts(),
            vec!["Race: Running", "1.Red5 24.531", "2.Maveri 1:02.004"]
        );
    }

    #[test]
    fn test_standings_results_failure_message() {
        let (mut surface, handle) = surface();
        let status = RaceStatus {
            phase: RacePhase::Staging,
            standings: None,
            results_failed: true,
        };
        let mut frame = surface.begin_frame();
        let content = race_standing(&mut frame, Some(&status));
        frame.commit().unwrap();

        assert_eq!(content, FrameContent::Placeholder);
        let last = handle.last_frame().unwrap();
        assert_eq!(
            last.texts(),
            vec!["Race: Staging", "Race in progress", "Monitoring laps..."]
        );
    }

    #[test]
    fn test_burn_in_positions_stay_in_safe_area() {
        let (mut surface, handle) = surface();
        let mut rng = StdRng::seed_from_u64(7);
        let voltage = reading("voltage", 7.4, "V");
        for _ in 0..50 {
            let mut frame = surface.begin_frame();
            burn_in_guard(&mut frame, Some(&voltage), clock(), &mut rng);
            frame.commit().unwrap();

            let last = handle.last_frame().unwrap();
            assert_eq!(last.texts(), vec!["7.4V", "14:05"]);
            let (vx, vy) = last.position_of("7.4V").unwrap();
            let (tx, ty) = last.position_of("14:05").unwrap();
            assert!((10..=78).contains(&vx) && (10..=22).contains(&vy));
            assert!((10..=78).contains(&tx) && (32..=44).contains(&ty));
        }
    }
}
