//! Frame data model.
//!
//! A `Frame` is one captured image plus the metadata the pipeline needs to
//! route and transform it: resolution, the exposure it was captured with, a
//! source label, and a capture timestamp. Pixels are packed RGB24.
//!
//! Invariant: `pixels.len() == width * height * 3` at construction and after
//! every processor stage. `Frame::new` validates it; stages that change the
//! pixel dimensions must rebuild the frame through `with_pixels`.

use anyhow::{anyhow, Result};
use std::time::SystemTime;

pub const BYTES_PER_PIXEL: usize = 3;

/// Width/height pair in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of an RGB24 payload at this resolution.
    pub fn byte_len(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| anyhow!("frame dimensions overflow: {}x{}", self.width, self.height))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured image plus capture metadata.
#[derive(Clone, Debug)]
pub struct Frame {
    pub resolution: Resolution,
    pub exposure: f64,
    pub source: String,
    pub captured_at: SystemTime,
    pixels: Vec<u8>,
}

impl Frame {
    /// Build a frame, validating that the payload matches the resolution.
    pub fn new(
        resolution: Resolution,
        exposure: f64,
        source: impl Into<String>,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let expected = resolution.byte_len()?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame payload length mismatch: expected {} bytes for {}, got {}",
                expected,
                resolution,
                pixels.len()
            ));
        }
        Ok(Self {
            resolution,
            exposure,
            source: source.into(),
            captured_at: SystemTime::now(),
            pixels,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Replace the payload (and resolution) in one step, keeping the
    /// length/resolution invariant. Used by stages that resample.
    pub fn with_pixels(self, resolution: Resolution, pixels: Vec<u8>) -> Result<Self> {
        let expected = resolution.byte_len()?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame payload length mismatch: expected {} bytes for {}, got {}",
                expected,
                resolution,
                pixels.len()
            ));
        }
        Ok(Self {
            resolution,
            pixels,
            ..self
        })
    }
}
