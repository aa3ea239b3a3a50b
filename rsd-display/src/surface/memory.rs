//! In-memory panel
//!
//! Keeps the most recent committed frames so tests (and headless runs) can
//! see exactly what would have been on the glass. Failures can be injected
//! through the handle.

use super::{DrawOp, FrameBuffer, FrameView, Panel, PanelError};
use embedded_graphics::prelude::Size;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

const KEEP_FRAMES: usize = 64;

/// A frame as it reached the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedFrame {
    pub buffer: FrameBuffer,
    pub ops: Vec<DrawOp>,
}

impl CommittedFrame {
    /// Text strings in drawing order
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                DrawOp::Line { .. } => None,
            })
            .collect()
    }

    /// Top-left corner of the first text equal to `needle`
    pub fn position_of(&self, needle: &str) -> Option<(i32, i32)> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Text { x, y, text } if text == needle => Some((*x, *y)),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| *t == needle)
    }
}

#[derive(Debug, Default)]
struct PanelState {
    frames: VecDeque<CommittedFrame>,
    total_frames: u64,
    fail_next: u32,
    disconnected: bool,
    clears: u32,
    released: bool,
}

/// Shared view of a [`MemoryPanel`]
#[derive(Debug, Clone, Default)]
pub struct MemoryPanelHandle {
    state: Arc<Mutex<PanelState>>,
}

impl MemoryPanelHandle {
    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_frame(&self) -> Option<CommittedFrame> {
        self.lock().frames.back().cloned()
    }

    /// Most recent frames, oldest first
    pub fn frames(&self) -> Vec<CommittedFrame> {
        self.lock().frames.iter().cloned().collect()
    }

    /// Frames committed over the panel's lifetime
    pub fn frame_count(&self) -> u64 {
        self.lock().total_frames
    }

    /// Fail the next `n` flushes with an I/O error
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Fail every flush until reconnected
    pub fn set_disconnected(&self, disconnected: bool) {
        self.lock().disconnected = disconnected;
    }

    pub fn clear_count(&self) -> u32 {
        self.lock().clears
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }
}

/// Panel that renders into memory
pub struct MemoryPanel {
    size: Size,
    handle: MemoryPanelHandle,
}

impl MemoryPanel {
    pub fn new(width: u32, height: u32) -> (Self, MemoryPanelHandle) {
        let handle = MemoryPanelHandle::default();
        (
            Self {
                size: Size::new(width, height),
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl Panel for MemoryPanel {
    fn name(&self) -> &str {
        "memory"
    }

    fn size(&self) -> Size {
        self.size
    }

    fn init(&mut self) -> Result<(), PanelError> {
        Ok(())
    }

    fn flush(&mut self, frame: &FrameView<'_>) -> Result<(), PanelError> {
        let mut state = self.handle.lock();
        if state.disconnected {
            return Err(PanelError::Disconnected);
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PanelError::Io("injected write failure".to_string()));
        }
        if state.frames.len() == KEEP_FRAMES {
            state.frames.pop_front();
        }
        state.frames.push_back(CommittedFrame {
            buffer: frame.buffer.clone(),
            ops: frame.ops.to_vec(),
        });
        state.total_frames += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PanelError> {
        self.handle.lock().clears += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.handle.lock().released = true;
    }
}
