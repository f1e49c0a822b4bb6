//! Frame acquisition.
//!
//! One `CaptureSource` per camera: it exclusively owns the device handle and
//! a single current-frame slot, runs a dedicated capture thread, and signals
//! a pulse on every stored frame. A `SourcePicker` multiplexes several
//! sources, routing all downstream reads to whichever one is selected.
//!
//! Device access goes through the `CameraDevice` trait: `stub://` paths get
//! a synthetic pattern generator, real V4L2 devices are feature-gated.

mod camera;
mod picker;
mod source;

pub use camera::{open_camera, CameraDevice, SyntheticCamera};
#[cfg(feature = "camera-v4l2")]
pub use camera::V4l2Camera;
pub use picker::SourcePicker;
pub use source::{CaptureSource, SourceStatus};
