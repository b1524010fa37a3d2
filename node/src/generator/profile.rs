use rand::{rngs::StdRng, Rng, SeedableRng};
use rd03dcore::protocol::{ChecksumKind, RawFrame, TargetBlock, TARGET_BLOCKS};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Configuration for generating a synthetic RD-03D byte stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub targets: usize,
    pub frame_interval_ms: u64,
    /// Chance of line noise before a frame.
    pub garbage_probability: f64,
    /// Chance that a frame's end marker is damaged.
    pub corrupt_probability: f64,
    pub seed: u64,
    pub checksum: ChecksumKind,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            targets: 1,
            frame_interval_ms: 100,
            garbage_probability: 0.05,
            corrupt_probability: 0.02,
            seed: 0,
            checksum: ChecksumKind::Sum8,
        }
    }
}

impl GeneratorConfig {
    fn normalized_targets(&self) -> usize {
        self.targets.min(TARGET_BLOCKS)
    }
}

/// Targets walking slow ellipses in front of the sensor.
pub struct SceneGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    frame_index: u64,
}

impl SceneGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn target_blocks(&self, frame_index: u64) -> Vec<Option<TargetBlock>> {
        let dt = self.config.frame_interval_ms.max(1) as f32 / 1000.0;
        let t = frame_index as f32 * dt;
        (0..self.config.normalized_targets())
            .map(|k| {
                let (x, y) = position(k, t);
                let (px, py) = position(k, t - dt);
                let radial_mm_s = (x.hypot(y) - px.hypot(py)) / dt;
                Some(TargetBlock {
                    x_mm: x.round() as i32,
                    y_mm: y.round() as i32,
                    speed_cm_s: (radial_mm_s / 10.0).round() as i32,
                    resolution: 360,
                })
            })
            .collect()
    }

    /// Next frame, possibly preceded by noise and possibly damaged.
    pub fn next_chunk(&mut self) -> Vec<u8> {
        let mut chunk = Vec::new();
        if self
            .rng
            .gen_bool(self.config.garbage_probability.clamp(0.0, 1.0))
        {
            let len = self.rng.gen_range(1..=8);
            // Noise stays below 0xAA so it can never fake a start marker.
            chunk.extend((0..len).map(|_| self.rng.gen_range(0x00u8..0xAA)));
        }

        let blocks = self.target_blocks(self.frame_index);
        let mut frame = RawFrame::encode(&blocks, self.config.checksum).into_bytes();
        if self
            .rng
            .gen_bool(self.config.corrupt_probability.clamp(0.0, 1.0))
        {
            if let Some(last) = frame.last_mut() {
                *last ^= 0x5A;
            }
        }
        chunk.extend_from_slice(&frame);
        self.frame_index += 1;
        chunk
    }
}

fn position(k: usize, t: f32) -> (f32, f32) {
    let phase = k as f32 * 2.0 * PI / 3.0;
    let omega = 2.0 * PI / (20.0 + 5.0 * k as f32);
    let angle = omega * t + phase;
    let x = 1500.0 * angle.sin();
    let y = 2000.0 + 1000.0 * k as f32 + 800.0 * angle.cos();
    (x, y)
}

pub fn build_frame_stream_from_config(config: &GeneratorConfig, frames: usize) -> Vec<u8> {
    let mut generator = SceneGenerator::new(config.clone());
    (0..frames).flat_map(|_| generator.next_chunk()).collect()
}

#[cfg(test)]
pub fn build_frame_stream(targets: usize, frames: usize) -> Vec<u8> {
    let config = GeneratorConfig {
        targets,
        garbage_probability: 0.0,
        corrupt_probability: 0.0,
        ..Default::default()
    };
    build_frame_stream_from_config(&config, frames)
}
