//! # Latency Metric
//!
//! Rolling average over the most recent operation durations. Filers and
//! transferors each carry one of these; the storage manager orders its
//! sources by the reported average so the fastest tier is consulted first.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::LATENCY_WINDOW;

/// Bounded queue of recent durations with an average.
///
/// Thread-safe; recording from concurrent operations is expected.
#[derive(Debug)]
pub struct LatencyWindow {
    samples: Mutex<VecDeque<Duration>>,
    max: usize,
}

impl LatencyWindow {
    /// Window over the default number of samples.
    pub fn new() -> Self {
        Self::with_max(LATENCY_WINDOW)
    }

    /// Window over at most `max` samples.
    pub fn with_max(max: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(max)),
            max,
        }
    }

    /// Record the time elapsed since `start`.
    pub fn record_since(&self, start: Instant) {
        self.record(start.elapsed());
    }

    /// Record one duration, evicting the oldest sample when full.
    pub fn record(&self, duration: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.max {
            samples.pop_front();
        }
        samples.push_back(duration);
    }

    /// Average of the retained samples; zero when none recorded yet.
    pub fn average(&self) -> Duration {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = samples.iter().sum();
        total / samples.len() as u32
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new()
    }
}
