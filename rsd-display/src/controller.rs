//! Display state controller
//!
//! Decides once per tick which [`DisplayMode`] to show and draws it. Mode
//! precedence, highest first:
//!
//! 1. an unexpired lap notice
//! 2. an active race (staging or racing)
//! 3. the burn-in guard once the panel has been idle long enough
//! 4. the voltage monitor
//!
//! All timing is driven by the [`TickInstant`] passed in, so the controller
//! never reads a clock of its own.

use crate::config::{DisplayConfig, RepeatedFailurePolicy};
use crate::error::DisplayError;
use crate::handoff::LapInbox;
use crate::surface::RenderSurface;
use crate::views::{self, FrameContent, ReadingStyle};
use chrono::{Local, NaiveTime};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rsd_adapters::{TelemetryAdapter, TickSnapshot};
use rsd_core::model::{Availability, DisplayMode, LapEvent, RacePhase};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The moment a tick runs, on both clocks the controller cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInstant {
    /// Monotonic time, used for every timer
    pub at: Instant,
    /// Wall-clock time of day, only ever displayed
    pub wall: NaiveTime,
}

impl TickInstant {
    pub fn now() -> Self {
        Self {
            at: Instant::now(),
            wall: Local::now().time(),
        }
    }
}

/// Controller state carried from one tick to the next
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub current_mode: DisplayMode,
    pub pending_lap_event: Option<LapEvent>,
    pub lap_event_expires_at: Option<Instant>,
    pub idle_since: Instant,
}

/// Outcome of one successful tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub mode: DisplayMode,
    pub content: FrameContent,
}

/// Pick the mode for a tick
///
/// Pure: the same inputs always give the same mode.
pub fn select_mode(
    lap_active: bool,
    race: Option<RacePhase>,
    idle_for: Duration,
    burn_in_after: Duration,
) -> DisplayMode {
    if lap_active {
        DisplayMode::LapNotice
    } else if race.is_some_and(RacePhase::is_active) {
        DisplayMode::RaceStanding
    } else if idle_for >= burn_in_after {
        DisplayMode::BurnInGuard
    } else {
        DisplayMode::VoltageMonitor
    }
}

pub struct DisplayController {
    adapter: TelemetryAdapter,
    inbox: LapInbox,
    state: ControllerState,
    lap_ttl: Duration,
    burn_in_after: Duration,
    title: String,
    style: ReadingStyle,
    failure_policy: RepeatedFailurePolicy,
    minimal_output: bool,
    rng: Box<dyn RngCore + Send>,
}

impl DisplayController {
    /// Create a controller that starts out idle at `started`
    pub fn new(
        adapter: TelemetryAdapter,
        inbox: LapInbox,
        config: &DisplayConfig,
        started: Instant,
    ) -> Self {
        Self {
            adapter,
            inbox,
            state: ControllerState {
                current_mode: DisplayMode::VoltageMonitor,
                pending_lap_event: None,
                lap_event_expires_at: None,
                idle_since: started,
            },
            lap_ttl: config.timing.lap_notice_ttl(),
            burn_in_after: config.timing.burn_in_after(),
            title: config.messages.title.clone(),
            style: ReadingStyle {
                show_current: config.sensors.show_current,
                voltage_decimals: config.sensors.voltage_decimals,
                current_decimals: config.sensors.current_decimals,
            },
            failure_policy: config.failures.on_repeated_failure,
            minimal_output: false,
            rng: Box::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the random source used for burn-in placement
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Switch to (or back from) the repeated-failure fallback output
    pub fn set_minimal_output(&mut self, minimal: bool) {
        if self.minimal_output != minimal {
            info!(
                "Minimal output {}",
                if minimal { "enabled" } else { "disabled" }
            );
        }
        self.minimal_output = minimal;
    }

    pub fn minimal_output(&self) -> bool {
        self.minimal_output
    }

    /// Run one tick: pick up lap events, read telemetry, pick a mode, draw it
    ///
    /// The only error is a failed commit; the mode decision has already been
    /// recorded by then and is not rolled back.
    pub fn tick(
        &mut self,
        surface: &mut RenderSurface,
        now: TickInstant,
    ) -> Result<TickReport, DisplayError> {
        self.accept_lap(now.at);
        let lap_active = self.state.pending_lap_event.is_some();

        // The notice suppresses everything else, so telemetry is not read
        let snapshot = if lap_active {
            TickSnapshot::empty()
        } else {
            self.adapter.snapshot()
        };
        if snapshot.voltage.is_failed() || snapshot.race.is_failed() {
            let part = if snapshot.voltage.is_failed() { "sensors" } else { "race" };
            let absorbed = DisplayError::TelemetryUnavailable(part.to_string());
            debug!("{}, drawing fallback content", absorbed);
        }

        let mode = self.next_mode(lap_active, &snapshot, now.at);
        if mode != self.state.current_mode {
            info!("Display mode {} -> {}", self.state.current_mode, mode);
        }
        self.state.current_mode = mode;

        let content = self.draw(surface, mode, &snapshot, now)?;
        debug!("Tick rendered {} ({:?})", mode, content);
        Ok(TickReport { mode, content })
    }

    /// Take a newly injected lap event and drop an expired one
    fn accept_lap(&mut self, now: Instant) {
        if let Some(pending) = self.inbox.take() {
            info!(
                "Lap notice for {} (lap {})",
                pending.event.pilot_display_name, pending.event.lap_number
            );
            self.state.lap_event_expires_at = Some(pending.received_at + self.lap_ttl);
            self.state.pending_lap_event = Some(pending.event);
        }
        if let Some(expires_at) = self.state.lap_event_expires_at {
            if now >= expires_at {
                debug!("Lap notice expired");
                self.state.pending_lap_event = None;
                self.state.lap_event_expires_at = None;
            }
        }
    }

    fn next_mode(&mut self, lap_active: bool, snapshot: &TickSnapshot, now: Instant) -> DisplayMode {
        // Race state unknown this tick: stay on the standings if that is what
        // was showing, otherwise carry on as if no race was running
        if !lap_active
            && snapshot.race.is_failed()
            && self.state.current_mode == DisplayMode::RaceStanding
        {
            warn!("Race status unavailable, holding standings view");
            self.state.idle_since = now;
            return DisplayMode::RaceStanding;
        }

        let phase = match &snapshot.race {
            Availability::Available(status) => Some(status.phase),
            Availability::Unavailable | Availability::Failed => None,
        };

        let going_idle = !lap_active && !phase.is_some_and(RacePhase::is_active);
        if going_idle && !self.state.current_mode.is_idle() {
            self.state.idle_since = now;
        }
        let idle_for = now.saturating_duration_since(self.state.idle_since);

        let mode = select_mode(lap_active, phase, idle_for, self.burn_in_after);
        if !mode.is_idle() {
            self.state.idle_since = now;
        }
        mode
    }

    fn draw(
        &mut self,
        surface: &mut RenderSurface,
        mode: DisplayMode,
        snapshot: &TickSnapshot,
        now: TickInstant,
    ) -> Result<FrameContent, DisplayError> {
        let mut frame = surface.begin_frame();
        let voltage = snapshot.voltage.as_ref();

        let content = if self.minimal_output {
            match self.failure_policy {
                RepeatedFailurePolicy::Minimal => {
                    let primary = voltage.into_option().and_then(|v| v.primary_voltage());
                    views::burn_in_guard(&mut frame, primary, now.wall, &mut *self.rng);
                    FrameContent::Minimal
                }
                RepeatedFailurePolicy::Blank => {
                    frame.clear();
                    FrameContent::Blank
                }
            }
        } else {
            match mode {
                DisplayMode::LapNotice => match &self.state.pending_lap_event {
                    Some(lap) => views::lap_notice(&mut frame, lap),
                    None => FrameContent::Blank,
                },
                DisplayMode::RaceStanding => {
                    let status = match &snapshot.race {
                        Availability::Available(status) => Some(status),
                        Availability::Unavailable | Availability::Failed => None,
                    };
                    views::race_standing(&mut frame, status)
                }
                DisplayMode::VoltageMonitor => {
                    let header = match &snapshot.race {
                        Availability::Available(status) => status.phase.header_text(),
                        Availability::Unavailable | Availability::Failed => None,
                    }
                    .unwrap_or(self.title.as_str());
                    views::voltage_monitor(
                        &mut frame,
                        header,
                        voltage,
                        &snapshot.inventory,
                        &self.style,
                        now.wall,
                    )
                }
                DisplayMode::BurnInGuard => {
                    let primary = voltage.into_option().and_then(|v| v.primary_voltage());
                    views::burn_in_guard(&mut frame, primary, now.wall, &mut *self.rng)
                }
            }
        };

        frame.commit()?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BURN_IN: Duration = Duration::from_secs(60);

    #[test]
    fn test_lap_notice_outranks_everything() {
        for phase in [None, Some(RacePhase::Racing), Some(RacePhase::Finished)] {
            let mode = select_mode(true, phase, Duration::from_secs(600), BURN_IN);
            assert_eq!(mode, DisplayMode::LapNotice);
        }
    }

    #[test]
    fn test_active_race_outranks_burn_in() {
        let idle = Duration::from_secs(600);
        assert_eq!(
            select_mode(false, Some(RacePhase::Racing), idle, BURN_IN),
            DisplayMode::RaceStanding
        );
        assert_eq!(
            select_mode(false, Some(RacePhase::Staging), idle, BURN_IN),
            DisplayMode::RaceStanding
        );
    }

    #[test]
    fn test_idle_threshold_is_inclusive() {
        let just_under = Duration::from_millis(59_999);
        assert_eq!(
            select_mode(false, None, just_under, BURN_IN),
            DisplayMode::VoltageMonitor
        );
        assert_eq!(
            select_mode(false, Some(RacePhase::Finished), BURN_IN, BURN_IN),
            DisplayMode::BurnInGuard
        );
        assert_eq!(
            select_mode(false, Some(RacePhase::Ready), Duration::ZERO, BURN_IN),
            DisplayMode::VoltageMonitor
        );
    }
}
