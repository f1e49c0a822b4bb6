//! Error taxonomy for the pipeline.
//!
//! Every variant here is contained at loop granularity: a fault is recorded
//! or logged and the owning loop moves on to its next iteration. No variant
//! terminates the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Camera failed to open or read. Non-fatal; the capture loop keeps
    /// retrying and the fault is reported through the source status field.
    #[error("device fault: {0}")]
    DeviceFault(String),

    /// Telemetry store unreachable. Exposure reconciliation is skipped for
    /// the iteration that observed this.
    #[error("config store unavailable: {0}")]
    ConfigUnavailable(String),

    /// A processor stage failed. The pipeline skips the publish for that
    /// tick and continues.
    #[error("processor '{stage}' failed: {reason}")]
    ProcessorError { stage: &'static str, reason: String },

    /// A detection iteration failed. Prior results remain valid until a
    /// successful detection replaces them.
    #[error("detection failed: {0}")]
    DetectionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_context() {
        let err = PipelineError::ProcessorError {
            stage: "resize",
            reason: "payload length mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "processor 'resize' failed: payload length mismatch"
        );

        let err = PipelineError::DeviceFault("failed to open camera 0".to_string());
        assert!(err.to_string().contains("camera 0"));
    }
}
