// SPDX-License-Identifier: GPL-3.0-only

//! Frame rate accounting for the stats observer

use crate::constants::display::FPS_LABEL;
use crate::constants::timing::FPS_WINDOW_MS;
use std::time::Instant;
use tracing::debug;

/// Receives `(label, value)` pairs such as `("FPS", 29.4)`
pub type StatsObserver = Box<dyn FnMut(&str, f64) + Send>;

/// Counts processed frames and reports a rate once per window
pub struct FpsCounter {
    window_start: Option<Instant>,
    frame_count: u64,
    last_fps: Option<f64>,
    observer: Option<StatsObserver>,
}

impl FpsCounter {
    pub fn new(observer: Option<StatsObserver>) -> Self {
        Self {
            window_start: None,
            frame_count: 0,
            last_fps: None,
            observer,
        }
    }

    /// Count one processed frame now
    pub fn record_frame(&mut self) -> Option<f64> {
        self.record_frame_at(Instant::now())
    }

    /// Count one processed frame at `now`
    ///
    /// Returns the rate when this frame closed a window. The first call opens
    /// the window and counts as its first frame.
    pub fn record_frame_at(&mut self, now: Instant) -> Option<f64> {
        self.frame_count += 1;
        let start = *self.window_start.get_or_insert(now);

        let elapsed_ms = now.saturating_duration_since(start).as_millis() as u64;
        if elapsed_ms < FPS_WINDOW_MS {
            return None;
        }

        let fps = self.frame_count as f64 * 1000.0 / elapsed_ms as f64;
        debug!(fps, frames = self.frame_count, elapsed_ms, "Frame rate window closed");

        if let Some(observer) = self.observer.as_mut() {
            observer(FPS_LABEL, fps);
        }

        self.frame_count = 0;
        self.window_start = Some(now);
        self.last_fps = Some(fps);
        Some(fps)
    }

    /// Rate reported by the most recent completed window
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}

impl std::fmt::Debug for FpsCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FpsCounter")
            .field("frame_count", &self.frame_count)
            .field("last_fps", &self.last_fps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn test_reports_once_per_window() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let reports_clone = Arc::clone(&reports);
        let mut counter = FpsCounter::new(Some(Box::new(move |label: &str, value: f64| {
            reports_clone.lock().unwrap().push((label.to_string(), value));
        })));

        // 25 frames 40 ms apart, the first one included
        let start = Instant::now();
        for i in 0..25 {
            assert_eq!(
                counter.record_frame_at(start + Duration::from_millis(i * 40)),
                None
            );
        }
        let fps = counter.record_frame_at(start + Duration::from_millis(1000));
        assert_eq!(fps, Some(26.0));
        assert_eq!(*reports.lock().unwrap(), vec![("FPS".to_string(), 26.0)]);
        assert_eq!(counter.last_fps(), Some(26.0));
    }

    #[test]
    fn test_window_resets_after_report() {
        let mut counter = FpsCounter::new(None);
        let start = Instant::now();
        counter.record_frame_at(start);
        assert_eq!(
            counter.record_frame_at(start + Duration::from_millis(2000)),
            Some(1.0)
        );

        // 10 frames over the next 2 s
        let second = start + Duration::from_millis(2000);
        let mut last = None;
        for i in 1..=10 {
            last = counter.record_frame_at(second + Duration::from_millis(i * 200));
        }
        assert_eq!(last, Some(5.0));
    }

    #[test]
    fn test_fractional_rate_is_kept() {
        let mut counter = FpsCounter::new(None);
        let start = Instant::now();
        counter.record_frame_at(start);
        counter.record_frame_at(start + Duration::from_millis(600));
        let fps = counter.record_frame_at(start + Duration::from_millis(1200));
        // 3 frames over 1200 ms
        assert_eq!(fps, Some(2.5));

        // 30 frames 34 ms apart, then one at 1020 ms
        let mut counter = FpsCounter::new(None);
        for i in 0..30 {
            counter.record_frame_at(start + Duration::from_millis(i * 34));
        }
        let fps = counter
            .record_frame_at(start + Duration::from_millis(1020))
            .unwrap();
        assert!((fps - 31.0 * 1000.0 / 1020.0).abs() < 1e-9);
    }
}
