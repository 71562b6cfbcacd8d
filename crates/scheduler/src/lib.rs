mod denoiser;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub use denoiser::{
    BeautyDenoiser, DenoiseError, DenoiseOutcome, DenoiseRequest, DenoiseResult, Denoiser,
    DenoiserConfig, DenoiserFactory,
};

pub const DEFAULT_HISTORY: usize = 10;

/// Source of monotonic time for the denoise loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Fixed-capacity rolling window of seconds values. Newest first.
#[derive(Debug, Clone)]
pub struct ValueTracker {
    capacity: usize,
    values: VecDeque<f32>,
}

impl ValueTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: f32) {
        self.values.push_front(value);
        if self.values.len() > self.capacity {
            self.values.pop_back();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Mean of the window, zero when empty.
    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f32>() / self.values.len() as f32
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Decides per readout whether a fresh denoise is worth its cost.
///
/// `min_interval` self-tunes between the observed denoise cost and
/// `1.2 * latency` by tracking `latency + 0.9 * min_interval` across calls.
#[derive(Debug, Clone)]
pub struct AdaptiveDenoiseScheduler {
    latency: ValueTracker,
    cost: ValueTracker,
    min_interval: f32,
    prev_cost_eval: f32,
    action_started: Option<Instant>,
    last_finished: Option<Instant>,
}

impl Default for AdaptiveDenoiseScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl AdaptiveDenoiseScheduler {
    pub fn new(history: usize) -> Self {
        Self {
            latency: ValueTracker::new(history),
            cost: ValueTracker::new(history),
            min_interval: 0.0,
            prev_cost_eval: 0.0,
            action_started: None,
            last_finished: None,
        }
    }

    pub fn track_start(&mut self, latency_sec: f32, now: Instant) {
        self.action_started = Some(now);
        self.latency.push(latency_sec);
    }

    pub fn should_run_now(&mut self, now: Instant) -> bool {
        if self.cost.is_empty() {
            return true;
        }
        let Some(last) = self.last_finished else {
            return true;
        };

        let cost_avg = self.cost.average();
        let interval = seconds(now.saturating_duration_since(last));
        if interval <= cost_avg {
            return false;
        }

        if self.min_interval < cost_avg {
            self.min_interval = cost_avg;
        }
        if self.min_interval >= interval {
            return false;
        }

        let latency_avg = self.latency.average();
        let current = latency_avg + 0.9 * self.min_interval;
        if self.prev_cost_eval > 0.0 {
            if self.prev_cost_eval < current {
                let delta = (current - self.prev_cost_eval).min(self.min_interval * 0.5);
                self.min_interval = (self.min_interval + delta).min(latency_avg * 1.2);
            } else if current < self.prev_cost_eval {
                let delta = (self.prev_cost_eval - current).min(self.min_interval * 0.5);
                self.min_interval = (self.min_interval - delta).max(cost_avg);
            }
        }
        self.prev_cost_eval = current;
        true
    }

    /// Records the cost of the denoise started by [`Self::track_start`].
    pub fn track_finish(&mut self, now: Instant) {
        let Some(started) = self.action_started.take() else {
            tracing::debug!("denoise finish without matching start");
            return;
        };
        self.cost.push(seconds(now.saturating_duration_since(started)));
        self.last_finished = Some(now);
    }

    /// Drops the pending start without recording a cost sample.
    pub fn track_failed(&mut self) {
        self.action_started = None;
    }

    pub fn reset(&mut self) {
        self.latency.clear();
        self.cost.clear();
        self.min_interval = 0.0;
        self.prev_cost_eval = 0.0;
        self.action_started = None;
    }

    pub fn min_interval(&self) -> f32 {
        self.min_interval
    }

    pub fn cost_average(&self) -> f32 {
        self.cost.average()
    }

    pub fn latency_average(&self) -> f32 {
        self.latency.average()
    }
}

fn seconds(duration: Duration) -> f32 {
    duration.as_secs_f32()
}
