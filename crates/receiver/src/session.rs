use std::collections::VecDeque;
use std::time::{Duration, Instant};

use fbcore::Viewport;

use crate::message::{CoarsePass, FrameStatus};

/// Messages per second over a sliding window.
#[derive(Debug, Clone)]
pub struct FpsTracker {
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl FpsTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stamps: VecDeque::new(),
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.stamps.push_back(now);
        self.expire(now);
    }

    pub fn fps(&self, now: Instant) -> f32 {
        let recent = self
            .stamps
            .iter()
            .filter(|stamp| now.saturating_duration_since(**stamp) <= self.window)
            .count();
        recent as f32 / self.window.as_secs_f32()
    }

    fn expire(&mut self, now: Instant) {
        while let Some(front) = self.stamps.front() {
            if now.saturating_duration_since(*front) > self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    pub last_sync_id: Option<u32>,
    pub view_id: u32,
    pub status: Option<FrameStatus>,
    pub progress: f32,
    pub coarse_pass: CoarsePass,
    pub roi: Option<Viewport>,
    pub sender_machine_id: i32,
    pub last_message_size: usize,
    pub snapshot_timestamp_micros: u64,
    pub latency_sec: f32,
    pub frame_started_at: Option<Instant>,
    pub denoise_albedo_input: String,
    pub denoise_normal_input: String,
    pub skipped: Vec<String>,
    pub fps: FpsTracker,
}

impl SessionState {
    pub fn new(fps_window: Duration) -> Self {
        Self {
            last_sync_id: None,
            view_id: 0,
            status: None,
            progress: 0.0,
            coarse_pass: CoarsePass::Unknown,
            roi: None,
            sender_machine_id: -1,
            last_message_size: 0,
            snapshot_timestamp_micros: 0,
            latency_sec: 0.0,
            frame_started_at: None,
            denoise_albedo_input: String::new(),
            denoise_normal_input: String::new(),
            skipped: Vec::new(),
            fps: FpsTracker::new(fps_window),
        }
    }
}
