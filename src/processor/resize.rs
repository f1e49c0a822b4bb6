//! Resize stage.

use anyhow::Result;

use crate::frame::{Frame, Resolution, BYTES_PER_PIXEL};
use crate::processor::SourceProcessor;

/// Resamples every frame to a fixed target resolution (nearest neighbor)
/// and sets `resolution` accordingly.
pub struct ResizeProcessor {
    target: Resolution,
}

impl ResizeProcessor {
    pub fn new(target: Resolution) -> Self {
        Self { target }
    }
}

impl SourceProcessor for ResizeProcessor {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn process(&self, frame: Frame) -> Result<Frame> {
        let src = frame.resolution;
        if src == self.target {
            return Ok(frame);
        }

        let dst = self.target;
        let mut pixels = vec![0u8; dst.byte_len()?];
        if src.width == 0 || src.height == 0 {
            // Nothing to sample from; emit a blank frame at the target size.
            return frame.with_pixels(dst, pixels);
        }
        let src_pixels = frame.pixels();

        let src_w = src.width as usize;
        let dst_w = dst.width as usize;
        let dst_h = dst.height as usize;
        for dy in 0..dst_h {
            let sy = dy * src.height as usize / dst_h;
            let src_row = sy * src_w * BYTES_PER_PIXEL;
            let dst_row = dy * dst_w * BYTES_PER_PIXEL;
            for dx in 0..dst_w {
                let sx = dx * src_w / dst_w;
                let s = src_row + sx * BYTES_PER_PIXEL;
                let d = dst_row + dx * BYTES_PER_PIXEL;
                pixels[d..d + BYTES_PER_PIXEL].copy_from_slice(&src_pixels[s..s + BYTES_PER_PIXEL]);
            }
        }

        frame.with_pixels(dst, pixels)
    }
}
