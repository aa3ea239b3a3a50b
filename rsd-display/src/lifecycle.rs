//! Display lifecycle
//!
//! This module handles:
//! - Opening the panel and reporting a disabled display when that fails
//! - The deferred start of the tick loop after a settle delay
//! - Running ticks off the async executor with panic containment
//! - Counting render failures and switching to fallback output
//! - Idempotent shutdown that waits for the loop and releases the panel

use crate::config::DisplayConfig;
use crate::controller::{DisplayController, TickInstant, TickReport};
use crate::error::DisplayError;
use crate::handoff::{lap_channel, LapInbox, LapSender};
use crate::surface::{Panel, PanelError, RenderSurface};
use rsd_adapters::{HostEvent, TelemetryAdapter};
use rsd_core::TelemetryProvider;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Externally visible state of the display subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Not started yet
    Idle,
    /// Panel is open, waiting out the settle delay
    Starting,
    /// Tick loop running
    Running,
    /// Panel could not be opened; no tick loop
    Disabled,
    /// Shut down, panel released
    Stopped,
}

/// What a start needs from the host
pub struct Resources {
    /// `None` when the host has no telemetry provider (yet)
    pub provider: Option<Box<dyn TelemetryProvider>>,
    pub panel: Box<dyn Panel>,
}

/// Produces fresh resources for each start attempt
pub type ResourceFactory = Box<dyn FnMut() -> Result<Resources, PanelError> + Send>;

/// Owns the tick loop and everything it needs
pub struct DisplayService {
    config: DisplayConfig,
    factory: ResourceFactory,
    lap_tx: LapSender,
    inbox: Option<LapInbox>,
    state_tx: watch::Sender<ServiceState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DisplayService {
    pub fn new(config: DisplayConfig, factory: ResourceFactory) -> Self {
        let (lap_tx, inbox) = lap_channel();
        let (state_tx, _) = watch::channel(ServiceState::Idle);
        Self {
            config,
            factory,
            lap_tx,
            inbox: Some(inbox),
            state_tx,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Handle for delivering lap notifications from any context
    pub fn lap_sender(&self) -> LapSender {
        self.lap_tx.clone()
    }

    pub fn state(&self) -> ServiceState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state_tx.subscribe()
    }

    /// Route a host notification
    pub async fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::Startup => {
                self.start();
            }
            HostEvent::Shutdown => {
                self.shutdown().await;
            }
            HostEvent::LapRecorded(lap) => self.lap_tx.notify(lap),
        }
    }

    /// Open the panel and schedule the tick loop
    ///
    /// Returns `false` when the display could not be initialized; the host
    /// keeps running either way. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.task.is_some() {
            warn!("Display already started");
            return true;
        }
        if self.inbox.is_none() {
            warn!("Display was shut down and cannot be restarted");
            return false;
        }

        let factory = &mut self.factory;
        let opened = self
            .config
            .validate()
            .map_err(DisplayError::from)
            .and_then(|()| factory().map_err(|e| DisplayError::Initialization(e.to_string())))
            .and_then(|resources| {
                let surface = RenderSurface::open(resources.panel, &self.config.panel.font)?;
                Ok((resources.provider, surface))
            });
        let (provider, surface) = match opened {
            Ok(parts) => parts,
            Err(e) => {
                error!("Display disabled: {}", e);
                self.state_tx.send_replace(ServiceState::Disabled);
                return false;
            }
        };
        let Some(inbox) = self.inbox.take() else {
            return false;
        };

        let filter = self.config.sensors.filter();
        let adapter = match provider {
            Some(provider) => {
                info!("Telemetry provider: {}", provider.name());
                TelemetryAdapter::new(provider, filter)
            }
            None => {
                info!("No telemetry provider, sensor and race data unavailable");
                TelemetryAdapter::detached(filter)
            }
        };

        self.state_tx.send_replace(ServiceState::Starting);
        let run = TickLoop {
            config: self.config.clone(),
            adapter,
            inbox,
            surface,
            cancel: self.cancel.clone(),
            state_tx: self.state_tx.clone(),
        };
        self.task = Some(tokio::spawn(run.run()));
        info!(
            "Display start scheduled in {:?}",
            self.config.timing.startup_delay()
        );
        true
    }

    /// Stop the tick loop and release the panel
    ///
    /// Waits for an in-flight tick to finish. Calling it again (or without a
    /// prior start) does nothing and reports success. Returns `false` only
    /// when the tick loop itself ended abnormally.
    pub async fn shutdown(&mut self) -> bool {
        self.inbox = None;
        let Some(task) = self.task.take() else {
            debug!("Display shutdown: nothing running");
            return true;
        };
        info!("Shutting down display");
        self.cancel.cancel();
        let clean = match task.await {
            Ok(()) => true,
            Err(e) => {
                error!("Display task ended abnormally: {}", e);
                false
            }
        };
        self.state_tx.send_replace(ServiceState::Stopped);
        info!("Display stopped");
        clean
    }
}

impl Drop for DisplayService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Tick loop
// =============================================================================

struct TickLoop {
    config: DisplayConfig,
    adapter: TelemetryAdapter,
    inbox: LapInbox,
    surface: RenderSurface,
    cancel: CancellationToken,
    state_tx: watch::Sender<ServiceState>,
}

type TickOutcome = Result<Result<TickReport, DisplayError>, Box<dyn Any + Send>>;

/// Controller and surface, shared with the blocking thread running a tick
struct TickParts {
    controller: DisplayController,
    surface: RenderSurface,
}

fn lock(parts: &Mutex<TickParts>) -> std::sync::MutexGuard<'_, TickParts> {
    parts.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TickLoop {
    async fn run(self) {
        let TickLoop {
            config,
            adapter,
            inbox,
            surface,
            cancel,
            state_tx,
        } = self;
        let timing = config.timing.clone();
        let threshold = config.failures.max_consecutive_render_failures;

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown during startup delay, tick loop never ran");
                release(surface).await;
                state_tx.send_replace(ServiceState::Stopped);
                return;
            }
            _ = sleep(timing.startup_delay()) => {}
        }

        let parts = Arc::new(Mutex::new(TickParts {
            controller: DisplayController::new(adapter, inbox, &config, Instant::now()),
            surface,
        }));
        let mut consecutive_failures: u32 = 0;
        state_tx.send_replace(ServiceState::Running);
        info!("Display tick loop running every {:?}", timing.refresh_interval());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let now = TickInstant::now();
            let shared = Arc::clone(&parts);
            let joined = tokio::task::spawn_blocking(move || {
                let mut guard = lock(&shared);
                let TickParts {
                    controller,
                    surface,
                } = &mut *guard;
                panic::catch_unwind(AssertUnwindSafe(|| controller.tick(surface, now)))
            })
            .await;
            let outcome: TickOutcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Display tick could not run, stopping: {}", e);
                    break;
                }
            };

            let result = outcome.unwrap_or_else(|payload| {
                Err(DisplayError::TickPanicked(panic_message(payload.as_ref())))
            });

            let pause = match result {
                Ok(report) => {
                    if consecutive_failures > 0 {
                        info!(
                            "Panel recovered after {} failed frames",
                            consecutive_failures
                        );
                        consecutive_failures = 0;
                        lock(&parts).controller.set_minimal_output(false);
                    }
                    debug!("Tick ok: {}", report.mode);
                    timing.refresh_interval()
                }
                Err(DisplayError::Render(e)) => {
                    consecutive_failures += 1;
                    warn!("Frame discarded: {}", e);
                    let mut guard = lock(&parts);
                    if consecutive_failures >= threshold && !guard.controller.minimal_output() {
                        let repeated = DisplayError::RepeatedRender {
                            count: consecutive_failures,
                        };
                        warn!("{}, switching to fallback output", repeated);
                        guard.controller.set_minimal_output(true);
                    }
                    timing.refresh_interval()
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Display tick degraded: {}", e);
                    timing.refresh_interval()
                }
                Err(e) => {
                    error!("Display tick failed: {}", e);
                    timing.error_backoff()
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }

        match Arc::try_unwrap(parts) {
            Ok(parts) => {
                let parts = parts.into_inner().unwrap_or_else(PoisonError::into_inner);
                release(parts.surface).await;
            }
            Err(_) => error!("Panel still in use by a tick, not released"),
        }
        state_tx.send_replace(ServiceState::Stopped);
        info!("Display tick loop ended");
    }
}

async fn release(surface: RenderSurface) {
    if let Err(e) = tokio::task::spawn_blocking(move || surface.release()).await {
        error!("Panel release failed: {}", e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
