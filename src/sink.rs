//! Downstream frame sinks.
//!
//! Sinks are external collaborators (network stream server, local display
//! window) that the pipeline feeds fire-and-forget: one raw frame per call,
//! no backpressure signal returned. The pipeline only depends on the
//! `FrameSink` trait; real sinks live outside this crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::frame::Frame;
use crate::pipeline::Pipeline;

pub trait FrameSink: Send + Sync {
    /// Accept one frame. Must be fast: this is called synchronously on the
    /// pipeline thread.
    fn put_frame(&self, frame: &Frame);
}

/// Diagnostic sink: counts frames and logs one line every `stride` frames.
pub struct StatsSink {
    name: String,
    stride: u64,
    count: AtomicU64,
}

impl StatsSink {
    pub fn new(name: impl Into<String>, stride: u64) -> Self {
        Self {
            name: name.into(),
            stride: stride.max(1),
            count: AtomicU64::new(0),
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl FrameSink for StatsSink {
    fn put_frame(&self, frame: &Frame) {
        let seen = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if seen % self.stride == 0 {
            log::info!(
                "sink '{}': {} frames, latest {} from {}",
                self.name,
                seen,
                frame.resolution,
                frame.source
            );
        }
    }
}

/// Register a sink with a pipeline's publish events.
pub fn attach_sink(pipeline: &Pipeline, sink: Arc<dyn FrameSink>) {
    pipeline.subscribe(move |frame: &Frame| sink.put_frame(frame));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;

    #[test]
    fn stats_sink_counts_frames() {
        let sink = StatsSink::new("stream", 10);
        let res = Resolution::new(2, 2);
        let frame = Frame::new(res, 0.01, "cam0", vec![0u8; 12]).unwrap();
        for _ in 0..5 {
            sink.put_frame(&frame);
        }
        assert_eq!(sink.frames_seen(), 5);
    }
}
