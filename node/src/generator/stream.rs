use crate::generator::profile::SceneGenerator;
use crate::workflow::source::{ByteSource, SourceRead};
use std::collections::VecDeque;
use std::io;
use std::time::Instant;

// Roughly what a UART driver would buffer before dropping bytes.
const PENDING_CAP: usize = 4096;

/// Plays generated frames out at the pace of the configured serial line.
pub struct SyntheticSource {
    generator: SceneGenerator,
    pending: VecDeque<u8>,
    bytes_per_second: u64,
    started: Instant,
    delivered: u64,
    generated: u64,
}

impl SyntheticSource {
    pub fn new(generator: SceneGenerator, bytes_per_second: u64) -> Self {
        Self {
            generator,
            pending: VecDeque::with_capacity(PENDING_CAP),
            bytes_per_second: bytes_per_second.max(1),
            started: Instant::now(),
            delivered: 0,
            generated: 0,
        }
    }

    pub fn read_at(&mut self, elapsed_ms: u64, buf: &mut [u8]) -> SourceRead {
        let interval = self.generator.config().frame_interval_ms.max(1);
        let due = elapsed_ms / interval + 1;
        while self.generated < due {
            if self.pending.len() < PENDING_CAP {
                self.pending.extend(self.generator.next_chunk());
            }
            self.generated += 1;
        }

        let line_budget = (elapsed_ms * self.bytes_per_second / 1000).saturating_sub(self.delivered);
        let count = buf
            .len()
            .min(self.pending.len())
            .min(usize::try_from(line_budget).unwrap_or(usize::MAX));
        if count == 0 {
            return SourceRead::Idle;
        }
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        self.delivered += count as u64;
        SourceRead::Data(count)
    }
}

impl ByteSource for SyntheticSource {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<SourceRead> {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        Ok(self.read_at(elapsed_ms, buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::GeneratorConfig;

    fn clean_source(bytes_per_second: u64) -> SyntheticSource {
        let config = GeneratorConfig {
            garbage_probability: 0.0,
            corrupt_probability: 0.0,
            ..Default::default()
        };
        SyntheticSource::new(SceneGenerator::new(config), bytes_per_second)
    }

    #[test]
    fn nothing_is_delivered_at_time_zero() {
        let mut source = clean_source(25_600);
        let mut buf = [0u8; 256];
        assert_eq!(source.read_at(0, &mut buf), SourceRead::Idle);
    }

    #[test]
    fn due_frames_are_released_once() {
        let mut source = clean_source(25_600);
        let mut buf = [0u8; 256];
        assert_eq!(source.read_at(100, &mut buf), SourceRead::Data(62));
        assert_eq!(source.read_at(100, &mut buf), SourceRead::Idle);
    }

    #[test]
    fn slow_line_throttles_delivery() {
        let mut source = clean_source(100);
        let mut buf = [0u8; 256];
        assert_eq!(source.read_at(100, &mut buf), SourceRead::Data(10));
        assert_eq!(source.read_at(200, &mut buf), SourceRead::Data(10));
    }
}
