//! Input sampling: cross-thread action counters and the sliding-window
//! actions-per-minute smoother.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::constants::APM_WINDOW_SAMPLES;

/// Thread-safe per-channel action counters fed by the platform input
/// listeners. The engine consumes them through [`ActionCounters::take`],
/// an atomic read-and-reset, so a count is never observed twice.
#[derive(Debug, Default)]
pub struct ActionCounters {
    keys: AtomicU32,
    mouse: AtomicU32,
}

impl ActionCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_key(&self) {
        self.keys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mouse(&self) {
        self.mouse.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop and reset both counters in one step.
    pub fn take(&self) -> (u32, u32) {
        (
            self.keys.swap(0, Ordering::Relaxed),
            self.mouse.swap(0, Ordering::Relaxed),
        )
    }

    /// Non-destructive snapshot for display purposes.
    #[must_use]
    pub fn peek(&self) -> (u32, u32) {
        (
            self.keys.load(Ordering::Relaxed),
            self.mouse.load(Ordering::Relaxed),
        )
    }
}

/// Fixed-size window of per-tick counts for one channel.
#[derive(Debug, Clone)]
struct ApmWindow {
    samples: VecDeque<u32>,
    capacity: usize,
}

impl ApmWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, count: u32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(count);
    }

    /// Smoothed actions-per-minute: `sum(window) / len(window) * 60`.
    /// An empty window reads as zero.
    fn rate(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: u32 = self.samples.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum as f32 / self.samples.len() as f32;
        mean * 60.0
    }
}

/// Two-channel smoother sampled once per simulation tick.
#[derive(Debug, Clone)]
pub struct ActivitySampler {
    keys: ApmWindow,
    mouse: ApmWindow,
}

impl Default for ActivitySampler {
    fn default() -> Self {
        Self::new(APM_WINDOW_SAMPLES)
    }
}

impl ActivitySampler {
    #[must_use]
    pub fn new(window: usize) -> Self {
        let capacity = window.max(1);
        Self {
            keys: ApmWindow::new(capacity),
            mouse: ApmWindow::new(capacity),
        }
    }

    /// Feed this tick's raw counts into both windows.
    pub fn push(&mut self, key_count: u32, mouse_count: u32) {
        self.keys.push(key_count);
        self.mouse.push(mouse_count);
    }

    /// Current smoothed (keyboard, mouse) APM pair.
    #[must_use]
    pub fn rates(&self) -> (f32, f32) {
        (self.keys.rate(), self.mouse.rate())
    }
}
