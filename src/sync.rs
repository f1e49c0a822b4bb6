//! Concurrency primitives shared by the capture and detection loops.
//!
//! Three small building blocks:
//!
//! - `FramePulse`: a condvar pulse. Waiters present at signal time are
//!   woken; a late waiter waits for the next pulse, it never replays a
//!   missed one.
//! - `LatestSlot<T>`: single-item overwrite storage. A new write discards
//!   any unconsumed previous value; only the freshest item matters.
//! - `ReadySignal`: one-shot startup gate, constructed by the orchestrator
//!   and passed by reference to anything that must wait on it.
//!
//! All locks here are narrow scope: held for the read or write itself,
//! never across a blocking call.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Outcome of a bounded pulse wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The pulse fired since the caller's last observed sequence.
    Signaled,
    /// The timeout lapsed without a pulse. Callers use this to re-check
    /// their stop flag before waiting again.
    TimedOut,
}

/// A condvar pulse with a monotonically increasing sequence number.
///
/// `signal()` bumps the sequence and wakes all current waiters. `wait`
/// blocks until the sequence advances past the sequence the caller last
/// observed, so a wake-up is consumed by reading the new sequence rather
/// than by a boolean that a second waiter could clear.
#[derive(Default)]
pub struct FramePulse {
    seq: Mutex<u64>,
    condvar: Condvar,
}

impl FramePulse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sequence number. A waiter records this before doing the work
    /// that may race with the next signal.
    pub fn sequence(&self) -> u64 {
        *self.seq.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wake all waiters that were waiting when the signal fired.
    pub fn signal(&self) {
        let mut seq = self.seq.lock().unwrap_or_else(|e| e.into_inner());
        *seq += 1;
        self.condvar.notify_all();
    }

    /// Block until the sequence advances past `last_seen` or `timeout`
    /// lapses. Returns the new sequence alongside the outcome so loops can
    /// carry it into the next wait.
    pub fn wait_from(&self, last_seen: u64, timeout: Duration) -> (u64, WaitOutcome) {
        let mut seq = self.seq.lock().unwrap_or_else(|e| e.into_inner());
        while *seq == last_seen {
            let (guard, result) = self
                .condvar
                .wait_timeout(seq, timeout)
                .unwrap_or_else(|e| e.into_inner());
            seq = guard;
            if result.timed_out() && *seq == last_seen {
                return (*seq, WaitOutcome::TimedOut);
            }
        }
        (*seq, WaitOutcome::Signaled)
    }

    /// Convenience for callers that do not track sequences themselves.
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let last_seen = self.sequence();
        self.wait_from(last_seen, timeout).1
    }
}

/// Single-item overwrite slot. Not a queue: a write replaces whatever was
/// there, and a reader that falls behind observes frame loss, by contract.
pub struct LatestSlot<T> {
    inner: Mutex<Option<T>>,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Store a value, discarding any unconsumed previous one.
    pub fn put(&self, value: T) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(value);
    }

    /// Take the current value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

impl<T: Clone> LatestSlot<T> {
    /// Read without consuming.
    pub fn peek(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot readiness gate. Once marked ready it stays ready; every waiter
/// past that point returns immediately.
#[derive(Default)]
pub struct ReadySignal {
    ready: Mutex<bool>,
    condvar: Condvar,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        self.condvar.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until `mark_ready` has been called. Returns false when the
    /// timeout lapsed first.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .condvar
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn pulse_wakes_present_waiter() {
        let pulse = Arc::new(FramePulse::new());
        let waiter = pulse.clone();
        let handle = std::thread::spawn(move || waiter.wait(Duration::from_secs(5)));
        // Give the waiter time to park before signaling.
        std::thread::sleep(Duration::from_millis(50));
        pulse.signal();
        assert_eq!(handle.join().unwrap(), WaitOutcome::Signaled);
    }

    #[test]
    fn pulse_does_not_replay_missed_signal() {
        let pulse = FramePulse::new();
        pulse.signal();
        // The signal fired before we started waiting, so we time out.
        let last_seen = pulse.sequence();
        let (_, outcome) = pulse.wait_from(last_seen, Duration::from_millis(20));
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn pulse_wait_from_observes_earlier_signal() {
        let pulse = FramePulse::new();
        let before = pulse.sequence();
        pulse.signal();
        // Sequence recorded before the signal, so the wait returns at once.
        let start = Instant::now();
        let (seq, outcome) = pulse.wait_from(before, Duration::from_secs(5));
        assert_eq!(outcome, WaitOutcome::Signaled);
        assert_eq!(seq, before + 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn slot_overwrites_unconsumed_value() {
        let slot = LatestSlot::new();
        slot.put(1);
        slot.put(2);
        slot.put(3);
        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn slot_peek_leaves_value_in_place() {
        let slot = LatestSlot::new();
        slot.put("frame");
        assert_eq!(slot.peek(), Some("frame"));
        assert_eq!(slot.take(), Some("frame"));
        assert!(slot.is_empty());
    }

    #[test]
    fn ready_signal_is_sticky() {
        let signal = Arc::new(ReadySignal::new());
        let waiter = signal.clone();
        let handle = std::thread::spawn(move || waiter.wait_ready(Duration::from_secs(5)));
        signal.mark_ready();
        assert!(handle.join().unwrap());
        // Late waiters return immediately.
        assert!(signal.wait_ready(Duration::from_millis(1)));
        assert!(signal.is_ready());
    }
}
