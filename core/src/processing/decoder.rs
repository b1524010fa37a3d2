use crate::prelude::{DecodeError, DecodeResult, FieldBounds, PipelineConfig, TargetMode};
use crate::protocol::{
    RawFrame, TargetBlock, TargetRecord, FRAME_HEADER, PAYLOAD_LEN, TARGET_BLOCK_LEN,
};

/// Turns a validated frame into target records. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    mode: TargetMode,
    bounds: FieldBounds,
}

impl FrameDecoder {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            mode: config.target_mode(),
            bounds: config.bounds,
        }
    }

    /// Single-target mode returns exactly one record (block 0); multi-target
    /// mode returns one record per configured slot, each flagged by presence.
    pub fn decode(&self, frame: &RawFrame) -> DecodeResult<Vec<TargetRecord>> {
        let payload = frame.payload().ok_or(DecodeError::BadLength {
            expected: FRAME_HEADER.len() + PAYLOAD_LEN,
            actual: frame.len(),
        })?;

        payload
            .chunks_exact(TARGET_BLOCK_LEN)
            .take(self.mode.slots())
            .enumerate()
            .map(|(index, bytes)| -> DecodeResult<TargetRecord> {
                let block = TargetBlock::parse(bytes);
                if let Some(block) = block.as_ref() {
                    self.check_bounds(block)?;
                }
                Ok(TargetRecord::from_block(index, block))
            })
            .collect()
    }

    fn check_bounds(&self, block: &TargetBlock) -> DecodeResult<()> {
        let range = self.bounds.max_range_mm;
        if block.x_mm.abs() > range {
            return Err(DecodeError::BadFieldRange {
                field: "x",
                value: block.x_mm,
            });
        }
        if !(0..=range).contains(&block.y_mm) {
            return Err(DecodeError::BadFieldRange {
                field: "y",
                value: block.y_mm,
            });
        }
        if block.speed_cm_s.abs() > self.bounds.max_speed_cm_s {
            return Err(DecodeError::BadFieldRange {
                field: "speed",
                value: block.speed_cm_s,
            });
        }
        Ok(())
    }
}
