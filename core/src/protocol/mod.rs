pub mod frame;
pub mod target;

pub use frame::{
    sum8, ChecksumKind, RawFrame, TargetBlock, FRAME_HEADER, FRAME_TAIL, PAYLOAD_LEN,
    TARGET_BLOCKS, TARGET_BLOCK_LEN,
};
pub use target::{TargetRecord, TargetSnapshot};
