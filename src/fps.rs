//! Rolling frames-per-second counter.
//!
//! Each loop (capture, detection) owns one and ticks it once per produced
//! item; the rate is logged at debug level every `window` frames and kept
//! readable for status reporting.

use std::sync::Mutex;
use std::time::Instant;

pub struct FpsCounter {
    name: String,
    window: u32,
    state: Mutex<FpsState>,
}

struct FpsState {
    frames_in_window: u32,
    total_frames: u64,
    window_started: Instant,
    last_rate: f64,
}

impl FpsCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_window(name, 30)
    }

    pub fn with_window(name: impl Into<String>, window: u32) -> Self {
        Self {
            name: name.into(),
            window: window.max(1),
            state: Mutex::new(FpsState {
                frames_in_window: 0,
                total_frames: 0,
                window_started: Instant::now(),
                last_rate: 0.0,
            }),
        }
    }

    /// Record one frame. Logs the rolling rate when the window fills.
    pub fn tick(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.frames_in_window += 1;
        state.total_frames += 1;

        if state.frames_in_window >= self.window {
            let elapsed = state.window_started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                state.last_rate = state.frames_in_window as f64 / elapsed;
                log::debug!("{}: {:.1} fps", self.name, state.last_rate);
            }
            state.frames_in_window = 0;
            state.window_started = Instant::now();
        }
    }

    /// Most recent completed-window rate; 0.0 before the first window fills.
    pub fn rate(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last_rate
    }

    pub fn total_frames(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .total_frames
    }
}
