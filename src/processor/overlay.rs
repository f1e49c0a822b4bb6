//! Reference-marking overlay stage.

use anyhow::Result;

use crate::frame::{Frame, BYTES_PER_PIXEL};
use crate::processor::SourceProcessor;

const LINE_COLOR: [u8; 3] = [0, 255, 0];
const LINE_WIDTH: u32 = 2;

/// Draws a vertical green center line sized to the current resolution.
/// Resolution is unchanged.
pub struct OverlayProcessor;

impl OverlayProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OverlayProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProcessor for OverlayProcessor {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn process(&self, mut frame: Frame) -> Result<Frame> {
        let width = frame.resolution.width;
        let height = frame.resolution.height;
        if width < LINE_WIDTH {
            return Ok(frame);
        }

        let x0 = width / 2;
        let pixels = frame.pixels_mut();
        for y in 0..height {
            for x in x0..(x0 + LINE_WIDTH).min(width) {
                let offset = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
                pixels[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&LINE_COLOR);
            }
        }
        Ok(frame)
    }
}
