//! Error taxonomy for the display subsystem

use crate::config::ConfigError;
use crate::surface::PanelError;
use thiserror::Error;

/// A frame that could not be committed to the panel
#[derive(Debug, Error)]
#[error("render failure: {0}")]
pub struct RenderFailure(#[from] pub PanelError);

#[derive(Debug, Error)]
pub enum DisplayError {
    /// Panel or font unavailable at startup; the display stays disabled
    #[error("display initialization failed: {0}")]
    Initialization(String),

    /// Telemetry could not be read for a tick
    #[error("telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    #[error(transparent)]
    Render(#[from] RenderFailure),

    /// Too many consecutive commits failed
    #[error("{count} consecutive render failures")]
    RepeatedRender { count: u32 },

    #[error("display tick panicked: {0}")]
    TickPanicked(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DisplayError {
    /// Whether the tick loop keeps its normal refresh cadence after this
    /// error rather than backing off
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DisplayError::Render(_) | DisplayError::TelemetryUnavailable(_)
        )
    }
}
