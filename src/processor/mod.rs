//! Frame transform stages.
//!
//! A `SourceProcessor` is a pure Frame -> Frame transform. Stages run in
//! registration order on the pipeline thread and must not assume the
//! incoming resolution; a stage that changes the pixel dimensions rebuilds
//! the frame so `resolution` keeps matching the payload.

mod overlay;
mod resize;
mod target_overlay;

pub use overlay::OverlayProcessor;
pub use resize::ResizeProcessor;
pub use target_overlay::TargetOverlayProcessor;

use anyhow::Result;

use crate::frame::Frame;

pub trait SourceProcessor: Send {
    /// Stage name for logs and error reports.
    fn name(&self) -> &'static str;

    /// Transform one frame. An error is contained at tick granularity: the
    /// pipeline logs it and skips the publish for that tick.
    fn process(&self, frame: Frame) -> Result<Frame>;
}
