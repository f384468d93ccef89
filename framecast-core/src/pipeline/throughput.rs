//! Rolling throughput meter for status reporting.
//!
//! Tracks frames and bytes over a sliding window so the sender and the
//! receiver can log frames/second and bytes/second without keeping the
//! whole history.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window frame and byte counter.
#[derive(Debug)]
pub struct ThroughputMeter {
    /// `(when, frame_bytes)` samples inside the window.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    window_bytes: u64,
    total_frames: u64,
    total_bytes: u64,
}

impl ThroughputMeter {
    /// Meter with a 1-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            window,
            window_bytes: 0,
            total_frames: 0,
            total_bytes: 0,
        }
    }

    /// Record one frame of `bytes` at the current instant.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.window_bytes += bytes;
        self.total_frames += 1;
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Bytes per second over the window.
    pub fn bytes_per_sec(&self) -> u64 {
        match self.span() {
            Some(secs) => (self.window_bytes as f64 / secs) as u64,
            None => 0,
        }
    }

    /// Frames per second over the window.
    ///
    /// Counts intervals between samples, so a single sample reads as 0.
    pub fn frames_per_sec(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        match self.span() {
            Some(secs) => (self.samples.len() - 1) as f64 / secs,
            None => 0.0,
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    // ── Internal ─────────────────────────────────────────────────

    /// Seconds between the oldest and newest sample, floored at 1 ms.
    fn span(&self) -> Option<f64> {
        let (first, last) = (self.samples.front()?, self.samples.back()?);
        let d = last.0.duration_since(first.0).max(Duration::from_millis(1));
        Some(d.as_secs_f64())
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.duration_since(ts) > self.window {
                self.samples.pop_front();
                self.window_bytes = self.window_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
