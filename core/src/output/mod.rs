pub mod dispatcher;
pub mod sinks;

pub use dispatcher::{OutputDispatcher, OutputSink};
pub use sinks::{LogFileSink, LogRollover, LogSinkConfig, SerialSink, WebSink};
