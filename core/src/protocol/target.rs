use crate::protocol::frame::TargetBlock;
use serde::{Deserialize, Serialize};

/// One target as seen by the pipeline. Positions in millimetres, speed in cm/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub slot: usize,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    /// Fourth word of the target block (distance-gate resolution on stock firmware).
    pub strength: f32,
    pub valid: bool,
}

impl TargetRecord {
    pub fn new(slot: usize, x: f32, y: f32, speed: f32, strength: f32) -> Self {
        Self {
            slot,
            x,
            y,
            speed,
            strength,
            valid: true,
        }
    }

    /// Placeholder for an unoccupied slot.
    pub fn empty(slot: usize) -> Self {
        Self {
            slot,
            x: 0.0,
            y: 0.0,
            speed: 0.0,
            strength: 0.0,
            valid: false,
        }
    }

    pub fn from_block(slot: usize, block: Option<TargetBlock>) -> Self {
        match block {
            Some(block) => Self::new(
                slot,
                block.x_mm as f32,
                block.y_mm as f32,
                block.speed_cm_s as f32,
                f32::from(block.resolution),
            ),
            None => Self::empty(slot),
        }
    }

    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = slot;
        self
    }

    pub fn distance_mm(&self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Bearing from boresight, positive to the right.
    pub fn angle_deg(&self) -> f32 {
        self.x.atan2(self.y).to_degrees()
    }

    pub fn distance_sq_to(&self, other: &TargetRecord) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// The published set of target states for one cycle.
///
/// Shared as `Arc<TargetSnapshot>` and never mutated after construction;
/// each tracker update produces a replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    sequence: u64,
    timestamp_ms: u64,
    targets: Vec<TargetRecord>,
}

impl TargetSnapshot {
    pub(crate) fn new(sequence: u64, timestamp_ms: u64, targets: Vec<TargetRecord>) -> Self {
        Self {
            sequence,
            timestamp_ms,
            targets,
        }
    }

    /// Snapshot with every slot empty, used before the first frame arrives.
    pub fn empty(slots: usize) -> Self {
        Self::new(0, 0, (0..slots).map(TargetRecord::empty).collect())
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &TargetRecord> {
        self.targets.iter().filter(|t| t.valid)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}
