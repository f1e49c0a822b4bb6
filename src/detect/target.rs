//! Detection output types.

use std::sync::{Arc, Mutex};

/// Shared read access to the worker's latest results. The worker is the
/// only writer; readers take snapshots.
pub type TargetsHandle = Arc<Mutex<Vec<VisionTarget>>>;

/// One detected target: geometry plus normalized scalar descriptors.
///
/// Positions and corner coordinates are normalized to [0,1] of the analyzed
/// frame, so consumers can draw them on frames of any resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct VisionTarget {
    /// Quadrilateral outline, normalized coordinates.
    pub corners: [(f32, f32); 4],
    /// Center position in [0,1].
    pub pos: (f32, f32),
    /// Apparent size, fraction of frame width.
    pub size: f32,
    /// Rotation in degrees.
    pub angle: f32,
    /// Estimated distance, arbitrary units.
    pub distance: f32,
}

impl VisionTarget {
    /// Axis-aligned target centered at `pos` with the given size. Corners
    /// are derived; angle and distance default to zero.
    pub fn centered(pos: (f32, f32), size: f32) -> Self {
        let half = size / 2.0;
        let (x, y) = pos;
        Self {
            corners: [
                (x - half, y - half),
                (x + half, y - half),
                (x + half, y + half),
                (x - half, y + half),
            ],
            pos,
            size,
            angle: 0.0,
            distance: 0.0,
        }
    }
}

/// Column-wise field arrays for telemetry publication: one array per field,
/// one element per target, in target order.
pub fn field_arrays(targets: &[VisionTarget]) -> [(&'static str, Vec<f64>); 5] {
    [
        (
            "pos_x",
            targets.iter().map(|t| t.pos.0 as f64).collect(),
        ),
        (
            "pos_y",
            targets.iter().map(|t| t.pos.1 as f64).collect(),
        ),
        ("size", targets.iter().map(|t| t.size as f64).collect()),
        ("angle", targets.iter().map(|t| t.angle as f64).collect()),
        (
            "distance",
            targets.iter().map(|t| t.distance as f64).collect(),
        ),
    ]
}
