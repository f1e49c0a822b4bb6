//! Capture thread for one camera.
//!
//! The loop per iteration: cooperative stop check, exposure reconciliation
//! against the telemetry store, blocking device read, store into the
//! single-frame slot (lock held only for the assignment), pulse, FPS tick.
//!
//! Failure policy: an open failure sets a persistent fault status and the
//! loop keeps retrying the open; a read failure records the fault for that
//! iteration without stopping the loop. Stop is cooperative only — a thread
//! blocked in a long device read exits within one read-call duration.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::camera::{open_camera, CameraDevice};
use crate::config::CameraSettings;
use crate::error::PipelineError;
use crate::fps::FpsCounter;
use crate::frame::{Frame, Resolution};
use crate::sync::{FramePulse, LatestSlot};
use crate::telemetry::TelemetryStore;

const OPEN_RETRY_BACKOFF: Duration = Duration::from_millis(250);
const READ_FAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Observable capture state. Faults are reported here, never escalated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceStatus {
    Idle,
    Capturing,
    Fault(String),
}

struct SourceShared {
    name: String,
    slot: LatestSlot<Frame>,
    pulse: Arc<FramePulse>,
    stop: AtomicBool,
    status: Mutex<SourceStatus>,
    resolution: Mutex<Resolution>,
    exposure: Mutex<f64>,
    fps: FpsCounter,
    telemetry: Arc<dyn TelemetryStore>,
}

impl SourceShared {
    fn set_status(&self, status: SourceStatus) {
        let mut guard = self.status.lock().unwrap_or_else(|e| e.into_inner());
        *guard = status;
    }

    fn exposure_key(&self) -> String {
        format!("{}/exposure", self.name)
    }
}

/// One camera, one thread, one current-frame slot.
///
/// Not restartable: once stopped, construct a new source.
pub struct CaptureSource {
    shared: Arc<SourceShared>,
    device: Mutex<Option<Box<dyn CameraDevice>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureSource {
    /// Build a source from configuration, resolving the device backend from
    /// the device path.
    pub fn open(settings: &CameraSettings, telemetry: Arc<dyn TelemetryStore>) -> Result<Self> {
        let device = open_camera(settings)?;
        Ok(Self::with_device(settings, device, telemetry))
    }

    /// Build a source around an already-constructed device. Test seam.
    pub fn with_device(
        settings: &CameraSettings,
        device: Box<dyn CameraDevice>,
        telemetry: Arc<dyn TelemetryStore>,
    ) -> Self {
        let shared = Arc::new(SourceShared {
            name: settings.name.clone(),
            slot: LatestSlot::new(),
            pulse: Arc::new(FramePulse::new()),
            stop: AtomicBool::new(false),
            status: Mutex::new(SourceStatus::Idle),
            resolution: Mutex::new(Resolution::new(settings.width, settings.height)),
            exposure: Mutex::new(settings.exposure),
            fps: FpsCounter::new(format!("capture[{}]", settings.name)),
            telemetry,
        });
        Self {
            shared,
            device: Mutex::new(Some(device)),
            join: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Spawn the capture thread. Errors if already started.
    pub fn start(&self) -> Result<()> {
        let device = {
            let mut guard = self.device.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .take()
                .ok_or_else(|| anyhow!("capture source '{}' already started", self.shared.name))?
        };
        let shared = self.shared.clone();
        let handle = std::thread::spawn(move || capture_loop(device, shared));
        let mut join = self.join.lock().unwrap_or_else(|e| e.into_inner());
        *join = Some(handle);
        Ok(())
    }

    /// Set the cooperative stop flag and join the thread. Joining may take
    /// up to one device-read duration.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let handle = {
            let mut join = self.join.lock().unwrap_or_else(|e| e.into_inner());
            join.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("capture thread '{}' panicked", self.shared.name);
            }
        }
    }

    /// Take the freshest frame, leaving the slot empty. `None` when no new
    /// frame has been captured since the last take.
    pub fn next_frame(&self) -> Option<Frame> {
        self.shared.slot.take()
    }

    /// Pulse signaled once per stored frame. Late waiters wait for the next
    /// pulse; missed pulses are not replayed.
    pub fn pulse(&self) -> Arc<FramePulse> {
        self.shared.pulse.clone()
    }

    pub fn resolution(&self) -> Resolution {
        *self
            .shared
            .resolution
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn exposure(&self) -> f64 {
        *self
            .shared
            .exposure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Request a new exposure. The value goes to the telemetry store; the
    /// capture loop reconciles it onto the device on its next iteration and
    /// confirms it back to the store.
    pub fn set_exposure(&self, value: f64) {
        if let Err(err) = self
            .shared
            .telemetry
            .put_number(&self.shared.exposure_key(), value)
        {
            log::debug!(
                "capture '{}': exposure request not stored: {}",
                self.shared.name,
                err
            );
        }
    }

    pub fn status(&self) -> SourceStatus {
        self.shared
            .status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn fps(&self) -> f64 {
        self.shared.fps.rate()
    }
}

fn capture_loop(mut device: Box<dyn CameraDevice>, shared: Arc<SourceShared>) {
    let mut opened = false;
    let mut cached_exposure = *shared
        .exposure
        .lock()
        .unwrap_or_else(|e| e.into_inner());

    log::info!("capture '{}': thread running", shared.name);

    while !shared.stop.load(Ordering::SeqCst) {
        if !opened {
            match device.open() {
                Ok(resolution) => {
                    opened = true;
                    {
                        let mut guard = shared
                            .resolution
                            .lock()
                            .unwrap_or_else(|e| e.into_inner());
                        *guard = resolution;
                    }
                    if let Err(err) = device.set_exposure(cached_exposure) {
                        log::warn!(
                            "capture '{}': initial exposure not applied: {}",
                            shared.name,
                            err
                        );
                    }
                    shared.set_status(SourceStatus::Capturing);
                }
                Err(err) => {
                    let fault = PipelineError::DeviceFault(err.to_string());
                    shared.set_status(SourceStatus::Fault(fault.to_string()));
                    log::warn!("capture '{}': open failed: {}", shared.name, fault);
                    std::thread::sleep(OPEN_RETRY_BACKOFF);
                    continue;
                }
            }
        }

        reconcile_exposure(device.as_mut(), &shared, &mut cached_exposure);

        match device.read_frame() {
            Ok(Some(pixels)) => {
                let resolution = *shared
                    .resolution
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                match Frame::new(resolution, cached_exposure, shared.name.clone(), pixels) {
                    Ok(frame) => {
                        shared.slot.put(frame);
                        shared.pulse.signal();
                        shared.fps.tick();
                        shared.set_status(SourceStatus::Capturing);
                    }
                    Err(err) => {
                        // Payload disagreed with the negotiated resolution.
                        shared.set_status(SourceStatus::Fault(err.to_string()));
                        log::warn!("capture '{}': bad frame dropped: {}", shared.name, err);
                    }
                }
            }
            Ok(None) => {
                log::debug!("capture '{}': undecoded frame", shared.name);
            }
            Err(err) => {
                let fault = PipelineError::DeviceFault(err.to_string());
                shared.set_status(SourceStatus::Fault(fault.to_string()));
                log::warn!("capture '{}': read failed: {}", shared.name, fault);
                std::thread::sleep(READ_FAULT_BACKOFF);
            }
        }
    }

    log::info!("capture '{}': thread exiting", shared.name);
}

/// Once per iteration: compare the cached exposure against the store's
/// value; on mismatch apply it to the device and write it back as
/// confirmation. Comparing against the cache (not the device) keeps the
/// write-back from being re-applied as a new external change.
fn reconcile_exposure(
    device: &mut dyn CameraDevice,
    shared: &SourceShared,
    cached_exposure: &mut f64,
) {
    let key = shared.exposure_key();
    let stored = match shared.telemetry.get_number(&key, *cached_exposure) {
        Ok(value) => value,
        Err(err) => {
            // Store unreachable; skip reconciliation this iteration.
            let err = PipelineError::ConfigUnavailable(err.to_string());
            log::debug!("capture '{}': {}", shared.name, err);
            return;
        }
    };
    if stored == *cached_exposure {
        return;
    }

    match device.set_exposure(stored) {
        Ok(()) => {
            *cached_exposure = stored;
            {
                let mut guard = shared.exposure.lock().unwrap_or_else(|e| e.into_inner());
                *guard = stored;
            }
            if let Err(err) = shared.telemetry.put_number(&key, stored) {
                log::debug!(
                    "capture '{}': exposure confirmation not stored: {}",
                    shared.name,
                    err
                );
            }
            log::info!("capture '{}': exposure set to {}", shared.name, stored);
        }
        Err(err) => {
            log::warn!(
                "capture '{}': failed to set exposure {}: {}",
                shared.name,
                stored,
                err
            );
        }
    }
}
