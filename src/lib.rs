//! Concurrent camera acquisition and processing pipeline.
//!
//! Frames flow from capture threads through a transform chain to
//! subscribers, while a detection worker analyzes frames at its own pace:
//!
//! ```text
//! CaptureSource(s) -> SourcePicker -> Pipeline (chain -> publish)
//!                                        |-> DetectionWorker -> telemetry
//!                                        |-> sinks (stream/display)
//! ```
//!
//! Design ground rules:
//!
//! - **Overwrite, never queue.** Each producer keeps a single current-item
//!   slot; a slow consumer observes frame loss, never backlog. Only the
//!   freshest frame matters for a live vision pipeline.
//! - **One writer per slot.** Every mutable slot (frame, exposure, results)
//!   has exactly one writer thread and its own narrow-scope lock, never
//!   held across a blocking call.
//! - **Cooperative stop.** `stop()` sets a flag observed once per loop
//!   iteration; a thread blocked in a device read exits within one
//!   read-call duration. No component restarts after stop.
//! - **Contained faults.** Device, config, processor, and detection errors
//!   are recorded or logged and the owning loop continues; nothing
//!   terminates the process.
//!
//! # Module structure
//!
//! - `capture`: camera devices, capture threads, source picker
//! - `pipeline` + `processor`: the tick loop and its transform stages
//! - `detect`: target finders and the decoupled detection worker
//! - `hub`, `sync`: fan-out and the pulse/slot/readiness primitives
//! - `telemetry`, `sink`: external collaborator interfaces
//! - `config`, `error`, `fps`: daemon config, error taxonomy, rate logging

pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod fps;
pub mod frame;
pub mod hub;
pub mod pipeline;
pub mod processor;
pub mod sink;
pub mod sync;
pub mod telemetry;

pub use capture::{CaptureSource, SourcePicker, SourceStatus};
pub use config::{CameraSettings, VisiondConfig};
pub use detect::{BrightSpotFinder, DetectionWorker, StubFinder, TargetFinder, VisionTarget};
pub use error::PipelineError;
pub use frame::{Frame, Resolution};
pub use hub::EventHub;
pub use pipeline::Pipeline;
pub use processor::{
    OverlayProcessor, ResizeProcessor, SourceProcessor, TargetOverlayProcessor,
};
pub use sink::{attach_sink, FrameSink, StatsSink};
pub use sync::{FramePulse, LatestSlot, ReadySignal, WaitOutcome};
pub use telemetry::{InMemoryTelemetryStore, TelemetryStore, TelemetryValue};
