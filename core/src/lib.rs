//! Frame ingestion and target tracking for the RD-03D radar node.
//!
//! Bytes from the sensor UART flow through [`processing::FrameReader`],
//! [`processing::FrameDecoder`] and [`processing::TargetTracker`] (with the
//! optional moving-average filter) into immutable snapshots that
//! [`output::OutputDispatcher`] fans out to the serial, web and log sinks at
//! a bounded rate.

pub mod math;
pub mod output;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod protocol;
pub mod telemetry;

pub use pipeline::{CycleReport, RadarPipeline};
pub use prelude::{ConfigError, DecodeError, FrameError, PipelineConfig, SinkError};
