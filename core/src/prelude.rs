use crate::protocol::{ChecksumKind, TARGET_BLOCKS};
use serde::{Deserialize, Serialize};

/// Plausibility bounds applied to decoded target fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldBounds {
    pub max_range_mm: i32,
    pub max_speed_cm_s: i32,
}

impl Default for FieldBounds {
    fn default() -> Self {
        Self {
            max_range_mm: 8_000,
            max_speed_cm_s: 1_000,
        }
    }
}

/// Immutable configuration shared by every pipeline component.
///
/// Built once at startup and handed to each constructor; nothing in the
/// pipeline reads global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub multi_target: bool,
    pub max_targets: usize,
    pub enable_filtering: bool,
    /// Moving-average window per slot.
    pub filter_depth: usize,
    /// Consecutive missed frames before an occupied slot is released.
    pub debounce_misses: u32,
    /// Largest distance at which a detection may continue an existing slot.
    pub association_gate_mm: f32,
    pub output_interval_ms: u64,
    pub max_frames_per_cycle: usize,
    /// Accumulator cap, expressed in whole frames.
    pub reader_buffer_frames: usize,
    pub checksum: ChecksumKind,
    pub bounds: FieldBounds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            multi_target: false,
            max_targets: 3,
            enable_filtering: false,
            filter_depth: 4,
            debounce_misses: 3,
            association_gate_mm: 1_000.0,
            output_interval_ms: 100,
            max_frames_per_cycle: 5,
            reader_buffer_frames: 16,
            checksum: ChecksumKind::Sum8,
            bounds: FieldBounds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_targets == 0 || self.max_targets > TARGET_BLOCKS {
            return Err(ConfigError::Invalid(format!(
                "max_targets must be within 1..={}, got {}",
                TARGET_BLOCKS, self.max_targets
            )));
        }
        let zero_checks = [
            ("filter_depth", self.filter_depth),
            ("debounce_misses", self.debounce_misses as usize),
            ("max_frames_per_cycle", self.max_frames_per_cycle),
            ("reader_buffer_frames", self.reader_buffer_frames),
        ];
        for (name, value) in zero_checks {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        if self.association_gate_mm.is_nan() || self.association_gate_mm <= 0.0 {
            return Err(ConfigError::Invalid(
                "association_gate_mm must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn target_mode(&self) -> TargetMode {
        if self.multi_target {
            TargetMode::Multi(self.max_targets)
        } else {
            TargetMode::Single
        }
    }

    /// Number of records in every published snapshot.
    pub fn snapshot_len(&self) -> usize {
        self.target_mode().slots()
    }

    /// Most bytes a single cycle can turn into frames.
    pub fn cycle_byte_budget(&self) -> usize {
        self.checksum.frame_len() * self.max_frames_per_cycle
    }
}

/// Whether frames are read as one target or as a set of independent targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Single,
    Multi(usize),
}

impl TargetMode {
    pub fn slots(self) -> usize {
        match self {
            TargetMode::Single => 1,
            TargetMode::Multi(max) => max,
        }
    }
}

/// Stream-level framing problems. Recovered by resync, only ever counted.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("corrupt frame (tail or checksum mismatch)")]
    Corrupt,
    #[error("incomplete frame (truncated by a new start marker)")]
    Incomplete,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("bad frame length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },
    #[error("field {field} out of range: {value}")]
    BadFieldRange { field: &'static str, value: i32 },
}

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("write failed: {0}")]
    WriteFailed(#[from] std::io::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type DecodeResult<T> = Result<T, DecodeError>;
pub type SinkResult<T> = Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_mirrors_firmware_header() {
        let config = PipelineConfig::default();
        assert!(!config.multi_target);
        assert_eq!(config.max_targets, 3);
        assert_eq!(config.output_interval_ms, 100);
        assert_eq!(config.max_frames_per_cycle, 5);
        assert_eq!(config.snapshot_len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unsupported_target_count() {
        let config = PipelineConfig {
            multi_target: true,
            max_targets: 4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_debounce() {
        let config = PipelineConfig {
            debounce_misses: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("debounce_misses"));
    }

    #[test]
    fn multi_target_snapshot_uses_max_targets() {
        let config = PipelineConfig {
            multi_target: true,
            max_targets: 2,
            ..Default::default()
        };
        assert_eq!(config.target_mode(), TargetMode::Multi(2));
        assert_eq!(config.snapshot_len(), 2);
    }
}
