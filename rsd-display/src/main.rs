//! RaceStatusDisplay
//!
//! Drives a 128x64 status panel from race-host telemetry. Host notifications
//! arrive as newline-delimited JSON on stdin; without a host the built-in
//! demo provider and lap feed keep the panel busy.

use anyhow::Result;
use rsd_adapters::{DemoLapFeed, DemoProvider, HostEvent};
use rsd_display::config::DisplayConfig;
use rsd_display::lifecycle::{DisplayService, ResourceFactory, Resources, ServiceState};
use rsd_display::surface::open_panel;
use std::io::IsTerminal;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// How often the demo feed reports a completed lap
const DEMO_LAP_INTERVAL: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RSD_CONFIG").ok());
    let config = match &config_path {
        Some(path) => DisplayConfig::load(path)?,
        None => DisplayConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level())),
        )
        .init();

    info!("Starting RaceStatusDisplay");
    match &config_path {
        Some(path) => info!("Config loaded from {}", path),
        None => info!("No config file given, using defaults"),
    }

    let panel_config = config.panel.clone();
    let factory: ResourceFactory = Box::new(move || {
        Ok(Resources {
            provider: Some(Box::new(DemoProvider::new())),
            panel: open_panel(&panel_config)?,
        })
    });
    let mut service = DisplayService::new(config, factory);

    // A piped stdin is the host's event feed and its startup event opens the
    // display; an interactive terminal has no host, so start right away
    let host_feed = !std::io::stdin().is_terminal();
    if host_feed {
        info!("Waiting for host startup event");
    } else {
        start_standalone(&mut service);
    }

    // Demo lap feed
    let laps = service.lap_sender();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DEMO_LAP_INTERVAL);
        interval.tick().await;
        for lap in DemoLapFeed::new() {
            interval.tick().await;
            laps.notify(lap);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_event(&line) {
                    Some(HostEvent::Shutdown) => break,
                    Some(event) => service.handle(event).await,
                    None => {}
                },
                Ok(None) => {
                    info!("Host event stream closed");
                    stdin_open = false;
                    start_standalone(&mut service);
                }
                Err(e) => {
                    warn!("Error reading host events: {}", e);
                    stdin_open = false;
                    start_standalone(&mut service);
                }
            },
        }
    }

    service.shutdown().await;
    info!("RaceStatusDisplay stopped");
    Ok(())
}

/// Start without a host, unless a host startup already did
fn start_standalone(service: &mut DisplayService) {
    if service.state() != ServiceState::Idle {
        return;
    }
    if !service.start() {
        warn!("Display disabled, continuing without it");
    }
}

fn parse_event(line: &str) -> Option<HostEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match HostEvent::parse_line(line) {
        Ok(Some(event)) => Some(event),
        Ok(None) => {
            warn!("Ignoring unknown host event: {}", line);
            None
        }
        Err(e) => {
            warn!("Ignoring malformed host event: {}", e);
            None
        }
    }
}
