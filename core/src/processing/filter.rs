use crate::math::StatsHelper;
use crate::processing::slot_arena::SlotArena;
use crate::protocol::TargetRecord;
use std::collections::VecDeque;

/// Per-slot moving average over position and speed.
pub struct TargetFilter {
    depth: usize,
    history: SlotArena<VecDeque<TargetRecord>>,
}

impl TargetFilter {
    pub fn new(slots: usize, depth: usize) -> Self {
        let depth = depth.max(1);
        let mut history = SlotArena::with_capacity(slots);
        for slot in 0..slots {
            history.occupy(slot, VecDeque::with_capacity(depth));
        }
        Self { depth, history }
    }

    /// Clears the window of `slot`; the next sample seeds it.
    pub fn reset(&mut self, slot: usize) {
        if let Some(window) = self.history.get_mut(slot) {
            window.clear();
        }
    }

    pub fn apply(&mut self, slot: usize, record: TargetRecord) -> TargetRecord {
        let Some(window) = self.history.get_mut(slot) else {
            return record;
        };
        if window.len() == self.depth {
            window.pop_front();
        }
        window.push_back(record);

        TargetRecord {
            x: StatsHelper::mean(window.iter().map(|r| r.x)),
            y: StatsHelper::mean(window.iter().map(|r| r.y)),
            speed: StatsHelper::mean(window.iter().map(|r| r.speed)),
            ..record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> TargetRecord {
        TargetRecord::new(0, x, y, 0.0, 0.0)
    }

    #[test]
    fn first_sample_passes_through() {
        let mut filter = TargetFilter::new(1, 4);
        assert_eq!(filter.apply(0, at(100.0, 200.0)), at(100.0, 200.0));
    }

    #[test]
    fn window_is_bounded_by_depth() {
        let mut filter = TargetFilter::new(1, 2);
        filter.apply(0, at(0.0, 0.0));
        filter.apply(0, at(10.0, 10.0));
        let smoothed = filter.apply(0, at(20.0, 40.0));
        assert_eq!(smoothed.x, 15.0);
        assert_eq!(smoothed.y, 25.0);
    }

    #[test]
    fn reset_discards_stale_history() {
        let mut filter = TargetFilter::new(2, 4);
        filter.apply(1, at(1000.0, 1000.0));
        filter.reset(1);
        assert_eq!(filter.apply(1, at(10.0, 20.0)), at(10.0, 20.0));
    }

    #[test]
    fn slots_are_independent() {
        let mut filter = TargetFilter::new(2, 4);
        filter.apply(0, at(500.0, 500.0));
        assert_eq!(filter.apply(1, at(10.0, 10.0)).x, 10.0);
    }
}
