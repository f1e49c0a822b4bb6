//! Target finder implementations.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::detect::target::VisionTarget;
use crate::frame::BYTES_PER_PIXEL;

/// Detection collaborator: image in, ordered target list out.
///
/// Synchronous and possibly slow; the worker decouples its cadence from the
/// pipeline. Implementations treat the pixel slice as read-only and must
/// not retain it past the call.
pub trait TargetFinder: Send {
    fn name(&self) -> &'static str;

    fn find_targets(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<VisionTarget>>;
}

// ----------------------------------------------------------------------------
// BrightSpotFinder: CPU finder
// ----------------------------------------------------------------------------

/// Locates the brightest block of the frame and reports it as one target
/// when it clears the brightness threshold.
pub struct BrightSpotFinder {
    block: u32,
    threshold: f64,
}

impl BrightSpotFinder {
    pub fn new() -> Self {
        Self {
            block: 8,
            threshold: 96.0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for BrightSpotFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetFinder for BrightSpotFinder {
    fn name(&self) -> &'static str {
        "bright-spot"
    }

    fn find_targets(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<VisionTarget>> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(anyhow!(
                "finder payload length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        if width < self.block || height < self.block {
            return Ok(vec![]);
        }

        let mut best = (0u32, 0u32, f64::MIN);
        for by in (0..height - self.block + 1).step_by(self.block as usize) {
            for bx in (0..width - self.block + 1).step_by(self.block as usize) {
                let mut sum = 0u64;
                for y in by..by + self.block {
                    for x in bx..bx + self.block {
                        let offset = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
                        // Perceptual-ish luma, integer weights.
                        let r = pixels[offset] as u64;
                        let g = pixels[offset + 1] as u64;
                        let b = pixels[offset + 2] as u64;
                        sum += (2 * r + 5 * g + b) / 8;
                    }
                }
                let mean = sum as f64 / (self.block * self.block) as f64;
                if mean > best.2 {
                    best = (bx, by, mean);
                }
            }
        }

        if best.2 < self.threshold {
            return Ok(vec![]);
        }

        let (bx, by, brightness) = best;
        let cx = (bx + self.block / 2) as f32 / width as f32;
        let cy = (by + self.block / 2) as f32 / height as f32;
        let mut target =
            VisionTarget::centered((cx, cy), self.block as f32 / width as f32);
        // Brighter reads as closer; crude but monotonic.
        target.distance = (255.0 - brightness).max(0.0) as f32 / 255.0;
        Ok(vec![target])
    }
}

// ----------------------------------------------------------------------------
// StubFinder: test double
// ----------------------------------------------------------------------------

/// Finder returning a configured target list, with hooks to slow it down,
/// fail a few calls, and record which payloads it analyzed.
pub struct StubFinder {
    targets: Vec<VisionTarget>,
    delay: Duration,
    fail_calls: u32,
    analyzed: Option<Arc<Mutex<Vec<u8>>>>,
}

impl StubFinder {
    pub fn new(targets: Vec<VisionTarget>) -> Self {
        Self {
            targets,
            delay: Duration::ZERO,
            fail_calls: 0,
            analyzed: None,
        }
    }

    /// Sleep this long inside every call, simulating a slow detector.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `count` calls.
    pub fn with_failures(mut self, count: u32) -> Self {
        self.fail_calls = count;
        self
    }

    /// Record the first payload byte of every analyzed frame.
    pub fn record_to(mut self, log: Arc<Mutex<Vec<u8>>>) -> Self {
        self.analyzed = Some(log);
        self
    }
}

impl TargetFinder for StubFinder {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn find_targets(
        &mut self,
        pixels: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<VisionTarget>> {
        if let Some(log) = &self.analyzed {
            let first = pixels.first().copied().unwrap_or(0);
            log.lock().unwrap_or_else(|e| e.into_inner()).push(first);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_calls > 0 {
            self.fail_calls -= 1;
            return Err(anyhow!("stub finder induced failure"));
        }
        Ok(self.targets.clone())
    }
}
