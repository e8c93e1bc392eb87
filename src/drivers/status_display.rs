//! Console status display.
//!
//! The board has no panel; each frame is written to the log, one line per
//! record, and the last frame is kept for inspection.

use log::info;

use crate::app::ports::DisplayPort;
use crate::error::DisplayError;
use crate::fsm::context::{StatusLine, STATUS_LINES};

#[derive(Default)]
pub struct ConsoleDisplay {
    last: heapless::Vec<StatusLine, STATUS_LINES>,
    frames: u32,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> impl Iterator<Item = &str> {
        self.last.iter().map(StatusLine::as_str)
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

impl DisplayPort for ConsoleDisplay {
    fn render_status(&mut self, lines: &[&str]) -> Result<(), DisplayError> {
        let mut frame = heapless::Vec::new();
        for line in lines {
            let line = StatusLine::try_from(*line).map_err(|()| DisplayError::Overflow)?;
            frame.push(line).map_err(|_| DisplayError::Overflow)?;
        }
        self.frames = self.frames.wrapping_add(1);
        for line in &frame {
            info!("[LCD] {}", line);
        }
        self.last = frame;
        Ok(())
    }
}
