pub mod decoder;
pub mod filter;
pub mod reader;
pub mod slot_arena;
pub mod tracker;

pub use decoder::FrameDecoder;
pub use filter::TargetFilter;
pub use reader::{FrameReader, Frames};
pub use slot_arena::SlotArena;
pub use tracker::TargetTracker;
