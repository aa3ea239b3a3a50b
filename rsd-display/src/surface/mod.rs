//! Render surface
//!
//! A fixed-size monochrome frame buffer with text and line primitives, and a
//! transactional [`Frame`] that is either committed to the [`Panel`] or
//! discarded. Drawing never fails: coordinates are clamped to the panel and
//! glyphs that run off the edge are clipped pixel by pixel.

pub mod memory;
pub mod sh1106;

use crate::config::{PanelBackend, PanelConfig};
use crate::error::{DisplayError, RenderFailure};
use embedded_graphics::{
    mono_font::{ascii, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use memory::{CommittedFrame, MemoryPanel, MemoryPanelHandle};
pub use sh1106::Sh1106Panel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("panel I/O error: {0}")]
    Io(String),

    #[error("panel disconnected")]
    Disconnected,

    #[error("frame is {frame_width}x{frame_height} but panel is {panel_width}x{panel_height}")]
    SizeMismatch {
        frame_width: u32,
        frame_height: u32,
        panel_width: u32,
        panel_height: u32,
    },

    #[error("panel unavailable: {0}")]
    Unavailable(String),
}

/// Boundary to the physical display driver
///
/// The tick loop owns the panel exclusively; implementations never see
/// concurrent calls.
pub trait Panel: Send {
    fn name(&self) -> &str;

    /// Pixel dimensions of the panel
    fn size(&self) -> Size;

    /// Power up and configure the panel
    fn init(&mut self) -> Result<(), PanelError>;

    /// Push a complete frame to the panel
    fn flush(&mut self, frame: &FrameView<'_>) -> Result<(), PanelError>;

    /// Blank the panel
    fn clear(&mut self) -> Result<(), PanelError>;

    /// Turn the panel off and let go of the bus
    fn release(&mut self) {}
}

/// Open the panel selected in the config
pub fn open_panel(config: &PanelConfig) -> Result<Box<dyn Panel>, PanelError> {
    match config.backend {
        PanelBackend::Sh1106 => sh1106::open_linux(config),
        PanelBackend::Memory => {
            let (panel, _handle) = MemoryPanel::new(config.width, config.height);
            Ok(Box::new(panel))
        }
    }
}

/// Built-in monospace fonts the panel can render with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontChoice {
    Font5x8,
    Font6x10,
    Font6x13Bold,
    Font7x13,
}

impl FontChoice {
    pub fn mono_font(self) -> &'static MonoFont<'static> {
        match self {
            FontChoice::Font5x8 => &ascii::FONT_5X8,
            FontChoice::Font6x10 => &ascii::FONT_6X10,
            FontChoice::Font6x13Bold => &ascii::FONT_6X13_BOLD,
            FontChoice::Font7x13 => &ascii::FONT_7X13,
        }
    }
}

/// Look up a font by its config name
pub fn font_by_name(name: &str) -> Option<FontChoice> {
    match name {
        "5x8" => Some(FontChoice::Font5x8),
        "6x10" => Some(FontChoice::Font6x10),
        "6x13_bold" => Some(FontChoice::Font6x13Bold),
        "7x13" => Some(FontChoice::Font7x13),
        _ => None,
    }
}

// =============================================================================
// Frame buffer
// =============================================================================

/// 1 bit per pixel, organized in 8-pixel-tall pages like SH1106/SSD1306 RAM
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let pages = height.div_ceil(8);
        Self {
            width,
            height,
            pixels: vec![0; (width * pages) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear_all(&mut self) {
        self.pixels.fill(0);
    }

    fn index(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        Some((((y / 8) * self.width + x) as usize, 1 << (y % 8)))
    }

    pub fn pixel(&self, x: i32, y: i32) -> bool {
        self.index(x, y)
            .map(|(i, bit)| self.pixels[i] & bit != 0)
            .unwrap_or(false)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if let Some((i, bit)) = self.index(x, y) {
            if on {
                self.pixels[i] |= bit;
            } else {
                self.pixels[i] &= !bit;
            }
        }
    }

    /// Number of lit pixels
    pub fn lit_count(&self) -> u32 {
        self.pixels.iter().map(|b| b.count_ones()).sum()
    }

    /// One page (8 rows) of column bytes
    pub fn page(&self, page: u32) -> &[u8] {
        let start = (page * self.width) as usize;
        let end = (start + self.width as usize).min(self.pixels.len());
        self.pixels.get(start..end).unwrap_or(&[])
    }

    pub fn page_count(&self) -> u32 {
        self.height.div_ceil(8)
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit", &self.lit_count())
            .finish()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

/// A drawing command as issued by the controller, kept next to the pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    Text { x: i32, y: i32, text: String },
    Line { from: Point, to: Point },
}

/// A finished frame as handed to the panel
pub struct FrameView<'a> {
    pub buffer: &'a FrameBuffer,
    pub ops: &'a [DrawOp],
}

// =============================================================================
// Surface
// =============================================================================

/// Owns the panel and the scratch buffer frames are drawn into
pub struct RenderSurface {
    panel: Box<dyn Panel>,
    font: FontChoice,
    scratch: FrameBuffer,
    ops: Vec<DrawOp>,
    committed: u64,
}

impl RenderSurface {
    /// Initialize the panel and pick the font
    ///
    /// Failure here disables the display subsystem.
    pub fn open(mut panel: Box<dyn Panel>, font_name: &str) -> Result<Self, DisplayError> {
        let font = font_by_name(font_name)
            .ok_or_else(|| DisplayError::Initialization(format!("unknown font '{}'", font_name)))?;
        panel.init().map_err(|e| {
            DisplayError::Initialization(format!("panel {}: {}", panel.name(), e))
        })?;
        if let Err(e) = panel.clear() {
            warn!("Could not clear panel {} after init: {}", panel.name(), e);
        }
        let size = panel.size();
        info!(
            "Render surface ready on {} ({}x{}, font {})",
            panel.name(),
            size.width,
            size.height,
            font_name
        );
        Ok(Self {
            scratch: FrameBuffer::new(size.width, size.height),
            panel,
            font,
            ops: Vec::new(),
            committed: 0,
        })
    }

    pub fn width(&self) -> i32 {
        self.scratch.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.scratch.height() as i32
    }

    /// Glyph height of the configured font
    pub fn text_height(&self) -> i32 {
        self.font.mono_font().character_size.height as i32
    }

    /// Frames committed so far
    pub fn committed_frames(&self) -> u64 {
        self.committed
    }

    /// Start a new, blank frame
    pub fn begin_frame(&mut self) -> Frame<'_> {
        self.scratch.clear_all();
        self.ops.clear();
        Frame {
            surface: self,
            finished: false,
        }
    }

    /// Blank the panel and hand it back to the driver
    pub fn release(mut self) {
        if let Err(e) = self.panel.clear() {
            warn!("Could not clear panel {} on release: {}", self.panel.name(), e);
        }
        self.panel.release();
        info!("Panel {} released", self.panel.name());
    }

    fn clamp(&self, x: i32, y: i32) -> Point {
        Point::new(
            x.clamp(0, self.width() - 1),
            y.clamp(0, self.height() - 1),
        )
    }
}

/// One frame being drawn; committed with [`Frame::commit`] or discarded on drop
pub struct Frame<'a> {
    surface: &'a mut RenderSurface,
    finished: bool,
}

impl Frame<'_> {
    pub fn width(&self) -> i32 {
        self.surface.width()
    }

    pub fn height(&self) -> i32 {
        self.surface.height()
    }

    pub fn text_height(&self) -> i32 {
        self.surface.text_height()
    }

    pub fn char_width(&self) -> i32 {
        self.surface.font.mono_font().character_size.width as i32
    }

    /// Erase everything drawn so far in this frame
    pub fn clear(&mut self) {
        self.reset();
    }

    /// Draw text with its top-left corner at `(x, y)`
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        let origin = self.surface.clamp(x, y);
        let style = MonoTextStyle::new(self.surface.font.mono_font(), BinaryColor::On);
        let _ = Text::with_baseline(text, origin, style, Baseline::Top).draw(&mut self.surface.scratch);
        self.surface.ops.push(DrawOp::Text {
            x: origin.x,
            y: origin.y,
            text: text.to_string(),
        });
    }

    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let from = self.surface.clamp(x1, y1);
        let to = self.surface.clamp(x2, y2);
        let _ = Line::new(from, to)
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut self.surface.scratch);
        self.surface.ops.push(DrawOp::Line { from, to });
    }

    /// Push the frame to the panel
    pub fn commit(mut self) -> Result<(), RenderFailure> {
        self.finished = true;
        let surface = &mut *self.surface;
        let view = FrameView {
            buffer: &surface.scratch,
            ops: &surface.ops,
        };
        surface.panel.flush(&view)?;
        surface.committed += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.surface.scratch.clear_all();
        self.surface.ops.clear();
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Frame dropped without commit, discarding");
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> (RenderSurface, MemoryPanelHandle) {
        let (panel, handle) = MemoryPanel::new(128, 64);
        let surface = RenderSurface::open(Box::new(panel), "6x10").unwrap();
        (surface, handle)
    }

    #[test]
    fn test_unknown_font_is_initialization_failure() {
        let (panel, _handle) = MemoryPanel::new(128, 64);
        let err = RenderSurface::open(Box::new(panel), "comic_sans").err().unwrap();
        assert!(matches!(err, DisplayError::Initialization(_)));
    }

    #[test]
    fn test_commit_reaches_panel() {
        let (mut surface, handle) = surface();
        let mut frame = surface.begin_frame();
        frame.draw_text(5, 0, "Voltage Monitor");
        frame.draw_line(0, 15, 128, 15);
        frame.commit().unwrap();

        let last = handle.last_frame().unwrap();
        assert_eq!(last.texts(), vec!["Voltage Monitor"]);
        assert!(last.buffer.pixel(0, 15));
        assert!(last.buffer.pixel(127, 15));
        assert!(last.buffer.lit_count() > 128);
        assert_eq!(surface.committed_frames(), 1);
    }

    #[test]
    fn test_out_of_bounds_coordinates_are_clamped() {
        let (mut surface, handle) = surface();
        let mut frame = surface.begin_frame();
        frame.draw_text(500, -20, "X");
        frame.draw_line(-10, 70, 300, 70);
        frame.commit().unwrap();

        let last = handle.last_frame().unwrap();
        assert_eq!(
            last.ops[0],
            DrawOp::Text {
                x: 127,
                y: 0,
                text: "X".to_string()
            }
        );
        assert_eq!(
            last.ops[1],
            DrawOp::Line {
                from: Point::new(0, 63),
                to: Point::new(127, 63)
            }
        );
    }

    #[test]
    fn test_failed_commit_is_reported_and_frame_dropped() {
        let (mut surface, handle) = surface();
        handle.fail_next(1);
        let mut frame = surface.begin_frame();
        frame.draw_text(0, 0, "lost");
        assert!(frame.commit().is_err());
        assert_eq!(handle.frame_count(), 0);
        assert_eq!(surface.committed_frames(), 0);

        let mut frame = surface.begin_frame();
        frame.draw_text(0, 0, "kept");
        frame.commit().unwrap();
        assert_eq!(handle.last_frame().unwrap().texts(), vec!["kept"]);
    }

    #[test]
    fn test_dropped_frame_is_never_committed() {
        let (mut surface, handle) = surface();
        {
            let mut frame = surface.begin_frame();
            frame.draw_text(0, 0, "abandoned");
        }
        assert_eq!(handle.frame_count(), 0);

        let frame = surface.begin_frame();
        frame.commit().unwrap();
        let last = handle.last_frame().unwrap();
        assert!(last.ops.is_empty());
        assert_eq!(last.buffer.lit_count(), 0);
    }

    #[test]
    fn test_clear_erases_frame_before_commit() {
        let (mut surface, handle) = surface();
        let mut frame = surface.begin_frame();
        frame.draw_text(5, 0, "Race Active");
        frame.draw_line(0, 13, 128, 13);
        frame.clear();
        frame.commit().unwrap();

        let last = handle.last_frame().unwrap();
        assert!(last.ops.is_empty());
        assert_eq!(last.buffer.lit_count(), 0);
        assert_eq!(surface.committed_frames(), 1);
    }

    #[test]
    fn test_open_panel_by_backend() {
        let config = PanelConfig {
            backend: PanelBackend::Memory,
            width: 96,
            height: 16,
            ..PanelConfig::default()
        };
        let panel = open_panel(&config).unwrap();
        assert_eq!(panel.size(), Size::new(96, 16));
    }

    #[test]
    fn test_release_clears_and_releases_panel() {
        let (surface, handle) = surface();
        surface.release();
        assert!(handle.is_released());
        assert!(handle.clear_count() >= 2);
    }
}
