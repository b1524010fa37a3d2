use crate::prelude::FrameError;
use serde::Serialize;
use std::sync::Mutex;

/// Side-channel counters shared by the pipeline components.
pub struct PipelineMetrics {
    inner: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub corrupt_frames: u64,
    pub incomplete_frames: u64,
    pub overflowed_bytes: u64,
    pub decode_errors: u64,
    pub snapshots: u64,
    pub emissions: u64,
    pub sink_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_frame(&self) {
        self.update(|m| m.frames += 1);
    }

    pub fn record_frame_error(&self, error: FrameError) {
        self.update(|m| match error {
            FrameError::Corrupt => m.corrupt_frames += 1,
            FrameError::Incomplete => m.incomplete_frames += 1,
        });
    }

    pub fn record_overflow(&self, bytes: usize) {
        self.update(|m| m.overflowed_bytes += bytes as u64);
    }

    pub fn record_decode_error(&self) {
        self.update(|m| m.decode_errors += 1);
    }

    pub fn record_snapshot(&self) {
        self.update(|m| m.snapshots += 1);
    }

    pub fn record_emission(&self) {
        self.update(|m| m.emissions += 1);
    }

    pub fn record_sink_failure(&self) {
        self.update(|m| m.sink_failures += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
