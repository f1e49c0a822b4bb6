//! Target annotation stage.
//!
//! Reads a snapshot of the detection worker's latest result list and draws
//! it onto the frame. This is the coupling point between the pipeline's
//! tick rate and detection's slower, independent rate: the drawn targets
//! may lag the current frame by one or more ticks.

use anyhow::Result;

use crate::detect::TargetsHandle;
use crate::frame::{Frame, BYTES_PER_PIXEL};
use crate::processor::SourceProcessor;

/// Per-target palette; targets beyond the palette are skipped.
const PALETTE: [[u8; 3]; 8] = [
    [230, 25, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [70, 240, 240],
    [240, 50, 230],
    [0, 128, 128],
    [250, 190, 230],
];

pub struct TargetOverlayProcessor {
    targets: TargetsHandle,
}

impl TargetOverlayProcessor {
    pub fn new(targets: TargetsHandle) -> Self {
        Self { targets }
    }

    fn draw_target(
        frame: &mut Frame,
        pos: (f32, f32),
        size: f32,
        color: [u8; 3],
    ) {
        let width = frame.resolution.width as i64;
        let height = frame.resolution.height as i64;
        let cx = (pos.0 * width as f32) as i64;
        let cy = (pos.1 * height as f32) as i64;
        let radius = ((size * width as f32) / 4.0).max(1.0) as i64;

        let pixels = frame.pixels_mut();
        for y in (cy - radius).max(0)..=(cy + radius).min(height - 1) {
            for x in (cx - radius).max(0)..=(cx + radius).min(width - 1) {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= radius * radius {
                    let offset = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
                    pixels[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&color);
                }
            }
        }
    }
}

impl SourceProcessor for TargetOverlayProcessor {
    fn name(&self) -> &'static str {
        "target-overlay"
    }

    fn process(&self, mut frame: Frame) -> Result<Frame> {
        // Snapshot under the lock, draw outside it.
        let targets = {
            let guard = self.targets.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };

        for (target, color) in targets.iter().zip(PALETTE.iter()) {
            Self::draw_target(&mut frame, target.pos, target.size, *color);
        }
        Ok(frame)
    }
}
