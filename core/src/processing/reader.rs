use crate::prelude::{FrameError, PipelineConfig};
use crate::protocol::{ChecksumKind, RawFrame, FRAME_HEADER, FRAME_TAIL, PAYLOAD_LEN};
use crate::telemetry::{LogManager, PipelineMetrics};
use std::sync::Arc;

/// Cuts complete frames out of the raw serial byte stream.
///
/// Bytes that do not belong to a frame are discarded up to the next start
/// marker; a trailing partial frame is kept for the next poll. Framing errors
/// are counted in [`PipelineMetrics`] and never surface to the caller.
pub struct FrameReader {
    accumulator: Vec<u8>,
    checksum: ChecksumKind,
    frame_len: usize,
    max_frames_per_cycle: usize,
    max_buffered: usize,
    metrics: Arc<PipelineMetrics>,
    logger: LogManager,
}

impl FrameReader {
    pub fn new(config: &PipelineConfig, metrics: Arc<PipelineMetrics>) -> Self {
        let frame_len = config.checksum.frame_len();
        let max_buffered = frame_len * config.reader_buffer_frames.max(1);
        Self {
            accumulator: Vec::with_capacity(max_buffered),
            checksum: config.checksum,
            frame_len,
            max_frames_per_cycle: config.max_frames_per_cycle.max(1),
            max_buffered,
            metrics,
            logger: LogManager::new("rd03d::reader"),
        }
    }

    /// Appends `bytes` and returns the frames that can be cut this cycle.
    ///
    /// The iterator is lazy and yields at most `max_frames_per_cycle` frames;
    /// anything beyond that stays buffered and is served by the next call,
    /// which may pass an empty slice.
    pub fn poll_bytes(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.accumulator.extend_from_slice(bytes);
        self.enforce_capacity();
        let remaining = self.max_frames_per_cycle;
        Frames {
            reader: self,
            remaining,
        }
    }

    /// Bytes currently held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.accumulator.len()
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    fn enforce_capacity(&mut self) {
        if self.accumulator.len() <= self.max_buffered {
            return;
        }
        self.discard_unreachable();
        if self.accumulator.len() <= self.max_buffered {
            return;
        }
        let excess = self.accumulator.len() - self.max_buffered;
        self.accumulator.drain(..excess);
        self.metrics.record_overflow(excess);
        self.logger
            .warn(&format!("accumulator overflow, dropped {} bytes", excess));
    }

    /// Drops every byte that cannot belong to a frame: anything not within
    /// one frame length of a start marker, except a trailing marker prefix.
    /// Candidate frames keep their exact bytes, so validation is unaffected.
    fn discard_unreachable(&mut self) {
        let len = self.accumulator.len();
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut from = 0;
        while let Some(offset) = find_marker(&self.accumulator[from..]) {
            let start = from + offset;
            push_span(&mut spans, start, (start + self.frame_len).min(len));
            from = start + 1;
        }
        let tail = partial_marker_len(&self.accumulator);
        if tail > 0 {
            push_span(&mut spans, len - tail, len);
        }

        let mut kept = Vec::with_capacity(self.max_buffered);
        for (start, end) in spans {
            kept.extend_from_slice(&self.accumulator[start..end]);
        }
        self.logger.detail(&format!(
            "discarded {} bytes outside any frame",
            len - kept.len()
        ));
        self.accumulator = kept;
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            match find_marker(&self.accumulator) {
                Some(0) => {}
                Some(offset) => {
                    self.accumulator.drain(..offset);
                }
                None => {
                    let keep = partial_marker_len(&self.accumulator);
                    let discard = self.accumulator.len() - keep;
                    self.accumulator.drain(..discard);
                    return None;
                }
            }

            if self.accumulator.len() < self.frame_len {
                return None;
            }

            match self.validate(&self.accumulator[..self.frame_len]) {
                Ok(()) => {
                    let bytes: Vec<u8> = self.accumulator.drain(..self.frame_len).collect();
                    self.metrics.record_frame();
                    return Some(RawFrame::new(bytes));
                }
                Err(error) => {
                    self.metrics.record_frame_error(error);
                    self.logger.detail(&format!("dropping frame: {}", error));
                    // Skip this start marker and look for the next one.
                    self.accumulator.drain(..1);
                }
            }
        }
    }

    fn validate(&self, candidate: &[u8]) -> Result<(), FrameError> {
        let payload_start = FRAME_HEADER.len();
        let payload_end = payload_start + PAYLOAD_LEN;
        let tail_start = candidate.len() - FRAME_TAIL.len();

        if candidate[tail_start..] == FRAME_TAIL {
            let payload = &candidate[payload_start..payload_end];
            let trailer = &candidate[payload_end..tail_start];
            return if self.checksum.verify(payload, trailer) {
                Ok(())
            } else {
                Err(FrameError::Corrupt)
            };
        }

        if find_marker(&candidate[1..]).is_some() {
            Err(FrameError::Incomplete)
        } else {
            Err(FrameError::Corrupt)
        }
    }
}

/// Frames available in one poll, bounded by the per-cycle budget.
pub struct Frames<'a> {
    reader: &'a mut FrameReader,
    remaining: usize,
}

impl Iterator for Frames<'_> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if self.remaining == 0 {
            return None;
        }
        let frame = self.reader.next_frame()?;
        self.remaining -= 1;
        Some(frame)
    }
}

fn find_marker(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(FRAME_HEADER.len())
        .position(|window| window == FRAME_HEADER)
}

// Merges `start..end` into the last span when they touch or overlap.
fn push_span(spans: &mut Vec<(usize, usize)>, start: usize, end: usize) {
    match spans.last_mut() {
        Some(last) if start <= last.1 => last.1 = last.1.max(end),
        _ => spans.push((start, end)),
    }
}

fn partial_marker_len(bytes: &[u8]) -> usize {
    (1..FRAME_HEADER.len())
        .rev()
        .find(|&len| bytes.ends_with(&FRAME_HEADER[..len]))
        .unwrap_or(0)
}
