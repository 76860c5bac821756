//! # Worker Latency Metrics
//!
//! Bounded sliding window of recent job processing times. The pool records
//! a sample per processed job and reads the p95 when it snapshots engine
//! state for the autoscaler.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

const DEFAULT_WINDOW: usize = 256;

/// Sliding window of processing durations with percentile lookup
#[derive(Debug)]
pub struct LatencyTracker {
    samples: Mutex<VecDeque<u64>>,
    window: usize,
}

impl LatencyTracker {
    /// Tracker keeping at most `window` recent samples
    pub fn new(window: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(window.min(DEFAULT_WINDOW))),
            window: window.max(1),
        }
    }

    /// Record one job's processing time, evicting the oldest sample when
    /// the window is full
    pub fn record(&self, duration: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(duration.as_millis() as u64);
    }

    /// 95th percentile over the current window, 0 when no samples exist
    pub fn p95_ms(&self) -> u64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0;
        }

        let mut times: Vec<u64> = samples.iter().copied().collect();
        times.sort_unstable();

        let p95_index = ((times.len() as f64) * 0.95) as usize;
        times
            .get(p95_index.min(times.len() - 1))
            .copied()
            .unwrap_or(0)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
