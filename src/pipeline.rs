//! Main processing pipeline.
//!
//! One tick: block on the active source's new-frame pulse (no busy
//! polling), pull the freshest frame, run the processor chain strictly in
//! registration order, store `last_frame`, then synchronously invoke every
//! subscriber on the pipeline's own thread. Subscribers must be fast and
//! must not panic; a slow subscriber stalls this thread by contract.
//!
//! A failing stage is contained at tick granularity: the publish for that
//! tick is skipped and the thread continues.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::SourcePicker;
use crate::error::PipelineError;
use crate::fps::FpsCounter;
use crate::frame::Frame;
use crate::hub::EventHub;
use crate::processor::SourceProcessor;

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

struct PipelineShared {
    picker: Arc<SourcePicker>,
    last_frame: Mutex<Option<Frame>>,
    hub: EventHub<Frame>,
    stop: AtomicBool,
    fps: FpsCounter,
}

pub struct Pipeline {
    shared: Arc<PipelineShared>,
    processors: Mutex<Option<Vec<Box<dyn SourceProcessor>>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    pub fn new(picker: Arc<SourcePicker>, processors: Vec<Box<dyn SourceProcessor>>) -> Self {
        let shared = Arc::new(PipelineShared {
            picker,
            last_frame: Mutex::new(None),
            hub: EventHub::new(),
            stop: AtomicBool::new(false),
            fps: FpsCounter::new("pipeline"),
        });
        Self {
            shared,
            processors: Mutex::new(Some(processors)),
            join: Mutex::new(None),
        }
    }

    /// Register a subscriber for processed frames. Invoked synchronously on
    /// the pipeline thread, in registration order.
    pub fn subscribe(&self, callback: impl Fn(&Frame) + Send + Sync + 'static) {
        self.shared.hub.register(callback);
    }

    /// Spawn the pipeline thread. Errors if already started; a stopped
    /// pipeline is not restartable.
    pub fn start(&self) -> Result<()> {
        let processors = {
            let mut guard = self.processors.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .take()
                .ok_or_else(|| anyhow!("pipeline already started"))?
        };
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || pipeline_loop(processors, shared));
        let mut join = self.join.lock().unwrap_or_else(|e| e.into_inner());
        *join = Some(handle);
        Ok(())
    }

    /// Cooperative stop, checked once per wake.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let handle = {
            let mut join = self.join.lock().unwrap_or_else(|e| e.into_inner());
            join.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("pipeline thread panicked");
            }
        }
    }

    /// Clone of the most recently published frame.
    pub fn last_frame(&self) -> Option<Frame> {
        self.shared
            .last_frame
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn fps(&self) -> f64 {
        self.shared.fps.rate()
    }
}

fn pipeline_loop(processors: Vec<Box<dyn SourceProcessor>>, shared: Arc<PipelineShared>) {
    log::info!(
        "pipeline running: {} stages, {} sources",
        processors.len(),
        shared.picker.len()
    );

    while !shared.stop.load(Ordering::SeqCst) {
        // Re-read the active source each iteration; the picker may have
        // switched while we waited.
        let pulse = shared.picker.pulse();
        let seen = pulse.sequence();

        let Some(frame) = shared.picker.next_frame() else {
            // Waiting from the pre-take sequence closes the window where a
            // frame lands between the take and the wait.
            pulse.wait_from(seen, STOP_CHECK_INTERVAL);
            continue;
        };

        match run_chain(&processors, frame) {
            Ok(frame) => {
                {
                    let mut guard = shared
                        .last_frame
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    *guard = Some(frame.clone());
                }
                shared.fps.tick();
                shared.hub.publish(&frame);
            }
            Err(err) => {
                log::warn!("tick dropped: {}", err);
            }
        }
    }

    log::info!("pipeline exiting");
}

fn run_chain(processors: &[Box<dyn SourceProcessor>], mut frame: Frame) -> Result<Frame> {
    for stage in processors {
        frame = stage.process(frame).map_err(|err| PipelineError::ProcessorError {
            stage: stage.name(),
            reason: err.to_string(),
        })?;
    }
    Ok(frame)
}
