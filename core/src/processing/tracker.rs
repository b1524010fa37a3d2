use crate::prelude::{PipelineConfig, TargetMode};
use crate::processing::filter::TargetFilter;
use crate::processing::slot_arena::SlotArena;
use crate::protocol::{TargetRecord, TargetSnapshot};
use crate::telemetry::LogManager;

#[derive(Debug, Clone, Copy)]
struct TrackSlot {
    record: TargetRecord,
    misses: u32,
}

/// Keeps slot identities stable across frames and produces snapshots.
///
/// In multi-target mode detections are matched to occupied slots by greedy
/// global nearest neighbour inside the association gate; an occupied slot
/// survives `debounce_misses - 1` consecutive misses holding its last state
/// and is released on the next one.
pub struct TargetTracker {
    mode: TargetMode,
    slots: SlotArena<TrackSlot>,
    debounce_misses: u32,
    gate_sq: f32,
    filter: Option<TargetFilter>,
    sequence: u64,
    logger: LogManager,
}

impl TargetTracker {
    pub fn new(config: &PipelineConfig) -> Self {
        let mode = config.target_mode();
        let filter = config
            .enable_filtering
            .then(|| TargetFilter::new(mode.slots(), config.filter_depth));
        Self {
            mode,
            slots: SlotArena::with_capacity(mode.slots()),
            debounce_misses: config.debounce_misses.max(1),
            gate_sq: config.association_gate_mm * config.association_gate_mm,
            filter,
            sequence: 0,
            logger: LogManager::new("rd03d::tracker"),
        }
    }

    pub fn update(&mut self, records: &[TargetRecord], timestamp_ms: u64) -> TargetSnapshot {
        match self.mode {
            TargetMode::Single => self.update_single(records),
            TargetMode::Multi(_) => self.update_multi(records),
        }
        self.sequence += 1;
        TargetSnapshot::new(self.sequence, timestamp_ms, self.collect())
    }

    pub fn active_count(&self) -> usize {
        self.slots.occupied().count()
    }

    fn update_single(&mut self, records: &[TargetRecord]) {
        match records.first().filter(|record| record.valid) {
            Some(record) => {
                let fresh = !self.slots.is_occupied(0);
                self.place(0, *record, fresh);
            }
            None => self.vacate(0),
        }
    }

    fn update_multi(&mut self, records: &[TargetRecord]) {
        let detections: Vec<&TargetRecord> = records.iter().filter(|r| r.valid).collect();

        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for (slot, track) in self.slots.occupied() {
            for (index, detection) in detections.iter().enumerate() {
                let distance_sq = track.record.distance_sq_to(detection);
                if distance_sq <= self.gate_sq {
                    candidates.push((distance_sq, slot, index));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut slot_matched = vec![false; self.slots.capacity()];
        let mut detection_matched = vec![false; detections.len()];
        for (_, slot, index) in candidates {
            if slot_matched[slot] || detection_matched[index] {
                continue;
            }
            slot_matched[slot] = true;
            detection_matched[index] = true;
            self.place(slot, *detections[index], false);
        }

        let missed: Vec<usize> = self
            .slots
            .occupied()
            .filter(|(slot, _)| !slot_matched[*slot])
            .map(|(slot, _)| slot)
            .collect();
        for slot in missed {
            let expired = match self.slots.get_mut(slot) {
                Some(track) => {
                    track.misses += 1;
                    track.misses >= self.debounce_misses
                }
                None => false,
            };
            if expired {
                self.vacate(slot);
            }
        }

        for (index, detection) in detections.iter().enumerate() {
            if detection_matched[index] {
                continue;
            }
            match self.slots.first_free() {
                Some(slot) => self.place(slot, **detection, true),
                None => self.logger.detail(&format!(
                    "no free slot for detection at ({:.0}, {:.0})",
                    detection.x, detection.y
                )),
            }
        }
    }

    fn place(&mut self, slot: usize, record: TargetRecord, fresh: bool) {
        let record = match self.filter.as_mut() {
            Some(filter) => {
                if fresh {
                    filter.reset(slot);
                }
                filter.apply(slot, record)
            }
            None => record,
        };
        if fresh {
            self.logger.detail(&format!("slot {} occupied", slot));
        }
        self.slots.occupy(
            slot,
            TrackSlot {
                record: record.with_slot(slot),
                misses: 0,
            },
        );
    }

    fn vacate(&mut self, slot: usize) {
        if self.slots.release(slot).is_some() {
            if let Some(filter) = self.filter.as_mut() {
                filter.reset(slot);
            }
            self.logger.detail(&format!("slot {} released", slot));
        }
    }

    fn collect(&self) -> Vec<TargetRecord> {
        (0..self.slots.capacity())
            .map(|slot| {
                self.slots
                    .get(slot)
                    .map(|track| track.record)
                    .unwrap_or_else(|| TargetRecord::empty(slot))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi_config() -> PipelineConfig {
        PipelineConfig {
            multi_target: true,
            max_targets: 3,
            debounce_misses: 3,
            ..Default::default()
        }
    }

    fn detection(x: f32, y: f32) -> TargetRecord {
        TargetRecord::new(0, x, y, 0.0, 0.0)
    }

    #[test]
    fn single_mode_reflects_latest_record() {
        let mut tracker = TargetTracker::new(&PipelineConfig::default());
        let snapshot = tracker.update(&[detection(120.0, 45.0)], 10);
        assert_eq!(snapshot.targets(), &[TargetRecord::new(0, 120.0, 45.0, 0.0, 0.0)]);
        assert_eq!(snapshot.timestamp_ms(), 10);

        let snapshot = tracker.update(&[TargetRecord::empty(0)], 20);
        assert!(!snapshot.targets()[0].valid);
        assert_eq!(snapshot.sequence(), 2);
    }

    #[test]
    fn snapshot_length_is_constant() {
        let mut tracker = TargetTracker::new(&multi_config());
        let inputs: Vec<Vec<TargetRecord>> = vec![
            vec![],
            vec![detection(0.0, 1000.0)],
            vec![
                detection(0.0, 1000.0),
                detection(2000.0, 2000.0),
                detection(-2000.0, 3000.0),
            ],
            vec![TargetRecord::empty(0), TargetRecord::empty(1)],
        ];
        for records in inputs {
            assert_eq!(tracker.update(&records, 0).len(), 3);
        }
    }

    #[test]
    fn nearest_neighbour_keeps_slot_identity() {
        let mut tracker = TargetTracker::new(&multi_config());
        tracker.update(&[detection(0.0, 1000.0), detection(1500.0, 1000.0)], 0);

        let snapshot = tracker.update(&[detection(1550.0, 1020.0), detection(40.0, 990.0)], 100);
        let targets = snapshot.targets();
        assert_eq!(targets[0].x, 40.0);
        assert_eq!(targets[1].x, 1550.0);
        assert!(!targets[2].valid);
    }

    #[test]
    fn slot_released_on_third_consecutive_miss() {
        let mut tracker = TargetTracker::new(&multi_config());
        tracker.update(&[detection(300.0, 1200.0)], 0);

        let first_miss = tracker.update(&[], 100);
        assert!(first_miss.targets()[0].valid, "held after first miss");
        assert_eq!(first_miss.targets()[0].x, 300.0);
        let second_miss = tracker.update(&[], 200);
        assert!(second_miss.targets()[0].valid, "held after second miss");
        let third_miss = tracker.update(&[], 300);
        assert!(!third_miss.targets()[0].valid, "released on third miss");
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn detection_resets_miss_count() {
        let mut tracker = TargetTracker::new(&multi_config());
        tracker.update(&[detection(300.0, 1200.0)], 0);
        tracker.update(&[], 100);
        tracker.update(&[], 200);
        tracker.update(&[detection(310.0, 1210.0)], 300);
        tracker.update(&[], 400);
        let snapshot = tracker.update(&[], 500);
        assert!(snapshot.targets()[0].valid);
    }

    #[test]
    fn distant_detection_takes_a_new_slot() {
        let mut tracker = TargetTracker::new(&multi_config());
        tracker.update(&[detection(0.0, 1000.0)], 0);
        let snapshot = tracker.update(&[detection(3000.0, 4000.0)], 100);
        let targets = snapshot.targets();
        assert_eq!(targets[0].x, 0.0, "slot 0 held, not stolen");
        assert!(targets[1].valid);
        assert_eq!(targets[1].slot, 1);
        assert_eq!(targets[1].x, 3000.0);
    }

    #[test]
    fn surplus_detections_are_dropped() {
        let config = PipelineConfig {
            max_targets: 1,
            ..multi_config()
        };
        let mut tracker = TargetTracker::new(&config);
        let snapshot = tracker.update(&[detection(0.0, 500.0), detection(2000.0, 500.0)], 0);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.targets()[0].x, 0.0);
    }

    #[test]
    fn filter_is_seeded_when_slot_is_reoccupied() {
        let config = PipelineConfig {
            enable_filtering: true,
            filter_depth: 4,
            ..Default::default()
        };
        let mut tracker = TargetTracker::new(&config);
        tracker.update(&[detection(0.0, 1000.0)], 0);
        let smoothed = tracker.update(&[detection(100.0, 1000.0)], 100);
        assert_eq!(smoothed.targets()[0].x, 50.0);

        tracker.update(&[TargetRecord::empty(0)], 200);
        let reseeded = tracker.update(&[detection(2000.0, 2000.0)], 300);
        assert_eq!(reseeded.targets()[0].x, 2000.0);
        assert_eq!(reseeded.targets()[0].y, 2000.0);
    }
}
