//! Target detection.
//!
//! The detection collaborator is opaque to the pipeline: a `TargetFinder`
//! maps an image to an ordered list of `VisionTarget`s. The
//! `DetectionWorker` runs a finder on its own thread at its own pace,
//! coalescing frames published while it is busy.

mod finder;
mod target;
mod worker;

pub use finder::{BrightSpotFinder, StubFinder, TargetFinder};
pub use target::{TargetsHandle, VisionTarget};
pub use worker::DetectionWorker;
