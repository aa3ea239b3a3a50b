//! RaceStatusDisplay display runtime
//!
//! Exposes the display components for the binary and integration tests.

pub mod config;
pub mod controller;
pub mod error;
pub mod handoff;
pub mod lifecycle;
pub mod surface;
pub mod views;

pub use config::DisplayConfig;
pub use controller::{select_mode, ControllerState, DisplayController, TickInstant, TickReport};
pub use error::{DisplayError, RenderFailure};
pub use handoff::{lap_channel, LapInbox, LapSender};
pub use lifecycle::{DisplayService, ResourceFactory, Resources, ServiceState};
pub use surface::{Panel, PanelError, RenderSurface};
pub use views::FrameContent;
