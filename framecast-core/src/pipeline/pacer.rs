//! Frame-rate pacing.
//!
//! Two strategies, picked by configuration:
//!
//! - [`PacingMode::FixedDelay`] sleeps a constant `1/fps` after every
//!   cycle. Capture, encode and send time add on top, so the real rate
//!   drifts below the target under load.
//! - [`PacingMode::Deadline`] schedules cycle `k` at `start + k/fps` on the
//!   monotonic clock. A late cycle pushes the schedule back so the next
//!   one is still a full interval away; missed deadlines are never bursted.
//!
//! Both guarantee successive cycles are at least `1/fps` apart.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacingMode {
    /// Constant sleep after each cycle.
    FixedDelay,
    /// Absolute schedule against the monotonic clock.
    #[default]
    Deadline,
}

/// Convert a target rate into a cycle interval.
pub fn frame_interval(target_fps: f64) -> Result<Duration, StreamError> {
    if !target_fps.is_finite() || target_fps <= 0.0 {
        return Err(StreamError::InvalidConfig(format!(
            "target fps must be a positive number, got {target_fps}"
        )));
    }
    let interval = Duration::try_from_secs_f64(1.0 / target_fps)
        .map_err(|e| StreamError::InvalidConfig(format!("target fps {target_fps}: {e}")))?;
    if interval.is_zero() {
        return Err(StreamError::InvalidConfig(format!(
            "target fps {target_fps} is beyond clock resolution"
        )));
    }
    Ok(interval)
}

/// Throttles the capture loop to a target rate.
#[derive(Debug)]
pub struct Pacer {
    mode: PacingMode,
    interval: Duration,
    /// Next deadline; `None` until the first wait.
    next: Option<Instant>,
    cycles: u64,
}

impl Pacer {
    pub fn new(target_fps: f64, mode: PacingMode) -> Result<Self, StreamError> {
        Ok(Self {
            mode,
            interval: frame_interval(target_fps)?,
            next: None,
            cycles: 0,
        })
    }

    pub fn mode(&self) -> PacingMode {
        self.mode
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of completed waits.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Suspend until the next cycle may start.
    ///
    /// Cancel-safe: dropping the future mid-wait leaves the schedule intact.
    pub async fn wait(&mut self) {
        match self.mode {
            PacingMode::FixedDelay => tokio::time::sleep(self.interval).await,
            PacingMode::Deadline => {
                // The first wait anchors the schedule one interval out.
                let target = *self
                    .next
                    .get_or_insert_with(|| Instant::now() + self.interval);
                tokio::time::sleep_until(target).await;
                self.next = Some(next_deadline(target, Instant::now(), self.interval));
            }
        }
        self.cycles += 1;
    }

    /// Restart the deadline schedule from now.
    pub fn reset(&mut self) {
        self.next = None;
    }
}

/// Deadline after one that was due at `target` and actually released at
/// `fired`.
fn next_deadline(target: Instant, fired: Instant, interval: Duration) -> Instant {
    (target + interval).max(fired + interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_fps() {
        assert_eq!(frame_interval(4.0).unwrap(), Duration::from_millis(250));
        assert!(frame_interval(0.0).is_err());
        assert!(frame_interval(-1.0).is_err());
        assert!(frame_interval(f64::NAN).is_err());
        assert!(frame_interval(f64::INFINITY).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_spacing() {
        let mut pacer = Pacer::new(30.0, PacingMode::FixedDelay).unwrap();
        let start = Instant::now();
        for _ in 0..10 {
            pacer.wait().await;
        }
        assert!(start.elapsed() >= pacer.interval() * 10);
        assert_eq!(pacer.cycles(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_drifts_with_work() {
        let mut pacer = Pacer::new(10.0, PacingMode::FixedDelay).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            pacer.wait().await;
        }
        // 5 × (50 ms work + 100 ms sleep).
        assert!(start.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_absorbs_work() {
        let mut pacer = Pacer::new(10.0, PacingMode::Deadline).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            pacer.wait().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(600), "elapsed = {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_keeps_full_interval_after_stall() {
        let mut pacer = Pacer::new(10.0, PacingMode::Deadline).unwrap();
        let start = Instant::now();
        pacer.wait().await;
        // Stall for several intervals. The overdue wait returns at once, the
        // one after it must still be a full interval later.
        tokio::time::sleep(Duration::from_millis(350)).await;
        pacer.wait().await;
        let t = Instant::now();
        pacer.wait().await;
        let gap = t.elapsed();
        assert!(gap >= pacer.interval(), "gap = {gap:?}");
        // 100 ms anchor, stalled to 450 ms, then one interval.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(550), "elapsed = {elapsed:?}");
        assert!(elapsed < Duration::from_millis(560), "elapsed = {elapsed:?}");
    }

    #[test]
    fn late_release_pushes_schedule_back() {
        let t0 = Instant::now();
        let i = Duration::from_millis(100);
        assert_eq!(next_deadline(t0, t0, i), t0 + i);
        let late = t0 + Duration::from_millis(30);
        assert_eq!(next_deadline(t0, late, i), late + i);
    }

    #[test]
    fn absurd_fps_rejected() {
        assert!(frame_interval(1e12).is_err());
    }
}
