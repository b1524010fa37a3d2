use serde::{Deserialize, Serialize};

/// Start marker of every RD-03D report frame.
pub const FRAME_HEADER: [u8; 4] = [0xAA, 0xFF, 0x03, 0x00];
/// End marker of every RD-03D report frame.
pub const FRAME_TAIL: [u8; 2] = [0x55, 0xCC];
pub const TARGET_BLOCK_LEN: usize = 8;
/// The sensor always reports three target blocks, occupied or not.
pub const TARGET_BLOCKS: usize = 3;
pub const PAYLOAD_LEN: usize = TARGET_BLOCK_LEN * TARGET_BLOCKS;

/// Integrity trailer placed between the payload and the end marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumKind {
    /// Stock sensor firmware: markers only.
    None,
    /// One byte holding the wrapping sum of the payload bytes.
    #[default]
    Sum8,
}

impl ChecksumKind {
    pub fn trailer_len(self) -> usize {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Sum8 => 1,
        }
    }

    pub fn frame_len(self) -> usize {
        FRAME_HEADER.len() + PAYLOAD_LEN + self.trailer_len() + FRAME_TAIL.len()
    }

    pub fn trailer(self, payload: &[u8]) -> Option<u8> {
        match self {
            ChecksumKind::None => None,
            ChecksumKind::Sum8 => Some(sum8(payload)),
        }
    }

    pub fn verify(self, payload: &[u8], trailer: &[u8]) -> bool {
        match self.trailer(payload) {
            None => trailer.is_empty(),
            Some(expected) => trailer == [expected],
        }
    }
}

pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// One delimited frame as cut from the serial stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Builds a complete frame; missing blocks are sent as empty.
    pub fn encode(blocks: &[Option<TargetBlock>], checksum: ChecksumKind) -> Self {
        let mut bytes = Vec::with_capacity(checksum.frame_len());
        bytes.extend_from_slice(&FRAME_HEADER);
        for index in 0..TARGET_BLOCKS {
            let block = blocks.get(index).copied().flatten();
            bytes.extend_from_slice(&TargetBlock::encode(block));
        }
        if let Some(trailer) = checksum.trailer(&bytes[FRAME_HEADER.len()..]) {
            bytes.push(trailer);
        }
        bytes.extend_from_slice(&FRAME_TAIL);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The target area, if the frame starts with the marker and is long enough.
    pub fn payload(&self) -> Option<&[u8]> {
        let start = FRAME_HEADER.len();
        if !self.bytes.starts_with(&FRAME_HEADER) || self.bytes.len() < start + PAYLOAD_LEN {
            return None;
        }
        Some(&self.bytes[start..start + PAYLOAD_LEN])
    }
}

/// Decoded contents of one 8-byte target block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetBlock {
    pub x_mm: i32,
    pub y_mm: i32,
    pub speed_cm_s: i32,
    pub resolution: u16,
}

impl TargetBlock {
    /// Returns `None` for an all-zero (unoccupied) block.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TARGET_BLOCK_LEN || bytes[..TARGET_BLOCK_LEN].iter().all(|&b| b == 0) {
            return None;
        }
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Some(Self {
            x_mm: from_sign_magnitude(word(0)),
            y_mm: from_sign_magnitude(word(2)),
            speed_cm_s: from_sign_magnitude(word(4)),
            resolution: word(6),
        })
    }

    pub fn encode(block: Option<TargetBlock>) -> [u8; TARGET_BLOCK_LEN] {
        let mut out = [0u8; TARGET_BLOCK_LEN];
        if let Some(block) = block {
            out[0..2].copy_from_slice(&to_sign_magnitude(block.x_mm).to_le_bytes());
            out[2..4].copy_from_slice(&to_sign_magnitude(block.y_mm).to_le_bytes());
            out[4..6].copy_from_slice(&to_sign_magnitude(block.speed_cm_s).to_le_bytes());
            out[6..8].copy_from_slice(&block.resolution.to_le_bytes());
        }
        out
    }
}

// Bit 15 set means positive; the low 15 bits carry the magnitude.
fn from_sign_magnitude(raw: u16) -> i32 {
    let magnitude = i32::from(raw & 0x7FFF);
    if raw & 0x8000 != 0 {
        magnitude
    } else {
        -magnitude
    }
}

fn to_sign_magnitude(value: i32) -> u16 {
    let magnitude = value.unsigned_abs().min(0x7FFF) as u16;
    if value >= 0 {
        0x8000 | magnitude
    } else {
        magnitude
    }
}
