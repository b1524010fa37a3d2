use rd03dcore::telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusModel {
    pub uptime_ms: u64,
    pub snapshot_sequence: u64,
    pub active_targets: usize,
    pub frames: u64,
    pub corrupt_frames: u64,
    pub incomplete_frames: u64,
    pub overflowed_bytes: u64,
    pub decode_errors: u64,
    pub snapshots: u64,
    pub emissions: u64,
    pub sink_failures: u64,
}

impl StatusModel {
    pub fn new(
        uptime_ms: u64,
        snapshot_sequence: u64,
        active_targets: usize,
        metrics: &MetricsSnapshot,
    ) -> Self {
        Self {
            uptime_ms,
            snapshot_sequence,
            active_targets,
            frames: metrics.frames,
            corrupt_frames: metrics.corrupt_frames,
            incomplete_frames: metrics.incomplete_frames,
            overflowed_bytes: metrics.overflowed_bytes,
            decode_errors: metrics.decode_errors,
            snapshots: metrics.snapshots,
            emissions: metrics.emissions,
            sink_failures: metrics.sink_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_carries_every_pipeline_counter() {
        let metrics = MetricsSnapshot {
            frames: 12,
            corrupt_frames: 2,
            incomplete_frames: 1,
            overflowed_bytes: 31,
            decode_errors: 3,
            snapshots: 9,
            emissions: 4,
            sink_failures: 1,
        };
        let status = StatusModel::new(1_500, 9, 2, &metrics);
        assert_eq!(status.uptime_ms, 1_500);
        assert_eq!(status.active_targets, 2);
        assert_eq!(status.overflowed_bytes, 31);
        assert_eq!(status.snapshots, 9);
        assert_eq!(status.decode_errors, 3);
        assert_eq!(status.sink_failures, 1);
    }
}
