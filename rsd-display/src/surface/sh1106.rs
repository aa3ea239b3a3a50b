//! SH1106 OLED panel over I2C
//!
//! Driver for 128x64 SH1106-based OLED displays. The controller has 132
//! columns of RAM, so every page write starts at a configurable column
//! offset (2 on the common modules).

use super::{FrameView, Panel, PanelError};
use crate::config::PanelConfig;
use embedded_graphics::prelude::Size;
use embedded_hal::i2c::{ErrorKind, I2c};
use tracing::{info, warn};

/// Display dimensions
const WIDTH: u32 = 128;
const HEIGHT: u32 = 64;
const PAGES: u32 = HEIGHT / 8;

/// SH1106 commands
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const SET_NORMAL: u8 = 0xA6;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_LOW_COLUMN: u8 = 0x00;
    pub const SET_HIGH_COLUMN: u8 = 0x10;
    pub const SET_PAGE_ADDR: u8 = 0xB0;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_SEG_REMAP: u8 = 0xA1;
    pub const SET_COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
}

/// Control bytes
const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

/// SH1106 OLED driver
pub struct Sh1106Panel<I2C> {
    i2c: I2C,
    address: u8,
    column_offset: u8,
}

impl<I2C: I2c> Sh1106Panel<I2C> {
    pub fn new(i2c: I2C, address: u8, column_offset: u8) -> Self {
        Self {
            i2c,
            address,
            column_offset,
        }
    }

    fn commands(&mut self, cmds: &[u8]) -> Result<(), PanelError> {
        for &c in cmds {
            self.i2c
                .write(self.address, &[CONTROL_COMMAND, c])
                .map_err(map_i2c_error)?;
        }
        Ok(())
    }

    fn write_page(&mut self, page: u32, columns: &[u8]) -> Result<(), PanelError> {
        let col = self.column_offset;
        self.commands(&[
            cmd::SET_PAGE_ADDR | (page as u8),
            cmd::SET_LOW_COLUMN | (col & 0x0F),
            cmd::SET_HIGH_COLUMN | (col >> 4),
        ])?;
        let mut data = Vec::with_capacity(columns.len() + 1);
        data.push(CONTROL_DATA);
        data.extend_from_slice(columns);
        self.i2c
            .write(self.address, &data)
            .map_err(map_i2c_error)
    }
}

fn map_i2c_error<E: embedded_hal::i2c::Error>(e: E) -> PanelError {
    match e.kind() {
        ErrorKind::NoAcknowledge(_) => PanelError::Disconnected,
        other => PanelError::Io(format!("{:?}", other)),
    }
}

impl<I2C: I2c + Send> Panel for Sh1106Panel<I2C> {
    fn name(&self) -> &str {
        "sh1106"
    }

    fn size(&self) -> Size {
        Size::new(WIDTH, HEIGHT)
    }

    fn init(&mut self) -> Result<(), PanelError> {
        self.commands(&[
            cmd::DISPLAY_OFF,
            cmd::SET_CLOCK_DIV,
            0x80, // Default clock
            cmd::SET_MUX_RATIO,
            0x3F, // 64 lines
            cmd::SET_DISPLAY_OFFSET,
            0x00,
            cmd::SET_START_LINE,
            cmd::SET_CHARGE_PUMP,
            0x14,                  // Enable charge pump
            cmd::SET_SEG_REMAP,    // Flip horizontally
            cmd::SET_COM_SCAN_DEC, // Flip vertically
            cmd::SET_COM_PINS,
            0x12, // Alternative COM config
            cmd::SET_CONTRAST,
            0xCF,
            cmd::SET_PRECHARGE,
            0xF1,
            cmd::SET_VCOM_DETECT,
            0x40,
            cmd::SET_NORMAL,
            cmd::DISPLAY_ON,
        ])?;
        info!("SH1106 at 0x{:02X} initialized", self.address);
        Ok(())
    }

    fn flush(&mut self, frame: &FrameView<'_>) -> Result<(), PanelError> {
        let buffer = frame.buffer;
        if buffer.width() != WIDTH || buffer.height() != HEIGHT {
            return Err(PanelError::SizeMismatch {
                frame_width: buffer.width(),
                frame_height: buffer.height(),
                panel_width: WIDTH,
                panel_height: HEIGHT,
            });
        }
        for page in 0..PAGES {
            self.write_page(page, buffer.page(page))?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        let blank = [0u8; WIDTH as usize];
        for page in 0..PAGES {
            self.write_page(page, &blank)?;
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Err(e) = self.commands(&[cmd::DISPLAY_OFF]) {
            warn!("Could not switch SH1106 off: {}", e);
        }
    }
}

/// Open the configured SH1106 on a Linux `/dev/i2c-N` bus
#[cfg(feature = "linux-i2c")]
pub fn open_linux(config: &PanelConfig) -> Result<Box<dyn Panel>, PanelError> {
    let bus = linux_embedded_hal::I2cdev::new(&config.i2c_bus)
        .map_err(|e| PanelError::Unavailable(format!("{}: {}", config.i2c_bus, e)))?;
    Ok(Box::new(Sh1106Panel::new(
        bus,
        config.i2c_address,
        config.column_offset,
    )))
}

#[cfg(not(feature = "linux-i2c"))]
pub fn open_linux(config: &PanelConfig) -> Result<Box<dyn Panel>, PanelError> {
    Err(PanelError::Unavailable(format!(
        "{}: built without the linux-i2c feature",
        config.i2c_bus
    )))
}
