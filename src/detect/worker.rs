//! Detection worker thread.
//!
//! The worker subscribes to pipeline output but runs at its own pace. A
//! frame published while detection is busy overwrites the pending slot;
//! only the most recent survives, so the worker never accumulates backlog
//! at the cost of skipping intermediate frames.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::detect::finder::TargetFinder;
use crate::detect::target::{field_arrays, TargetsHandle, VisionTarget};
use crate::error::PipelineError;
use crate::fps::FpsCounter;
use crate::frame::Frame;
use crate::hub::EventHub;
use crate::sync::{FramePulse, LatestSlot};
use crate::telemetry::TelemetryStore;

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

struct WorkerShared {
    pending: LatestSlot<Frame>,
    dirty: FramePulse,
    targets: TargetsHandle,
    hub: EventHub<Vec<VisionTarget>>,
    stop: AtomicBool,
    telemetry: Arc<dyn TelemetryStore>,
    fps: FpsCounter,
}

pub struct DetectionWorker {
    shared: Arc<WorkerShared>,
    finder: Mutex<Option<Box<dyn TargetFinder>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl DetectionWorker {
    pub fn new(finder: Box<dyn TargetFinder>, telemetry: Arc<dyn TelemetryStore>) -> Self {
        let shared = Arc::new(WorkerShared {
            pending: LatestSlot::new(),
            dirty: FramePulse::new(),
            targets: Arc::new(Mutex::new(Vec::new())),
            hub: EventHub::new(),
            stop: AtomicBool::new(false),
            telemetry,
            fps: FpsCounter::new("detection"),
        });
        Self {
            shared,
            finder: Mutex::new(Some(finder)),
            join: Mutex::new(None),
        }
    }

    /// Pipeline-hub callback: overwrite the pending slot and mark dirty.
    /// Fast and non-blocking; never runs detection on the caller's thread.
    pub fn on_frame(&self, frame: &Frame) {
        self.shared.pending.put(frame.clone());
        self.shared.dirty.signal();
    }

    /// Spawn the worker thread. Errors if already started.
    pub fn start(&self) -> Result<()> {
        let finder = {
            let mut guard = self.finder.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .take()
                .ok_or_else(|| anyhow::anyhow!("detection worker already started"))?
        };
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || detection_loop(finder, shared));
        let mut join = self.join.lock().unwrap_or_else(|e| e.into_inner());
        *join = Some(handle);
        Ok(())
    }

    /// Cooperative stop, observed within one finder call plus one stop-check
    /// interval.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.dirty.signal();
        let handle = {
            let mut join = self.join.lock().unwrap_or_else(|e| e.into_inner());
            join.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("detection worker thread panicked");
            }
        }
    }

    /// Snapshot of the latest results. Valid results persist across failed
    /// detection iterations.
    pub fn targets(&self) -> Vec<VisionTarget> {
        self.shared
            .targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Shared handle for consumers that read results on every tick, like
    /// the target overlay stage.
    pub fn targets_handle(&self) -> TargetsHandle {
        self.shared.targets.clone()
    }

    /// Register for results-updated events (telemetry sinks and the like).
    pub fn subscribe(&self, callback: impl Fn(&Vec<VisionTarget>) + Send + Sync + 'static) {
        self.shared.hub.register(callback);
    }

    pub fn fps(&self) -> f64 {
        self.shared.fps.rate()
    }
}

fn detection_loop(mut finder: Box<dyn TargetFinder>, shared: Arc<WorkerShared>) {
    log::info!("detection worker running ({})", finder.name());
    let mut last_seen = shared.dirty.sequence();

    while !shared.stop.load(Ordering::SeqCst) {
        let (seen, _) = shared.dirty.wait_from(last_seen, STOP_CHECK_INTERVAL);
        last_seen = seen;

        // Snapshot the newest pending frame; anything older was overwritten
        // while we were busy and is intentionally skipped.
        let Some(frame) = shared.pending.take() else {
            continue;
        };

        let result = finder.find_targets(
            frame.pixels(),
            frame.resolution.width,
            frame.resolution.height,
        );
        match result {
            Ok(new_targets) => {
                {
                    let mut guard = shared
                        .targets
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    *guard = new_targets.clone();
                }
                shared.fps.tick();
                publish_telemetry(&shared, &new_targets);
                shared.hub.publish(&new_targets);
            }
            Err(err) => {
                // Prior results stay valid until a successful detection
                // replaces them.
                let err = PipelineError::DetectionError(err.to_string());
                log::warn!("{}", err);
            }
        }
    }

    log::info!("detection worker exiting");
}

fn publish_telemetry(shared: &WorkerShared, targets: &[VisionTarget]) {
    if let Err(err) = shared
        .telemetry
        .put_number("targets/count", targets.len() as f64)
    {
        log::debug!("telemetry unavailable for target count: {}", err);
        return;
    }
    for (field, values) in field_arrays(targets) {
        let key = format!("targets/{}", field);
        if let Err(err) = shared.telemetry.put_number_array(&key, &values) {
            log::debug!("telemetry unavailable for {}: {}", key, err);
        }
    }
}
