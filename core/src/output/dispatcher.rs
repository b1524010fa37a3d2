use crate::prelude::{PipelineConfig, SinkResult};
use crate::protocol::TargetSnapshot;
use crate::telemetry::{LogManager, PipelineMetrics};
use std::sync::Arc;

/// A consumer of published snapshots (serial console, web bridge, log file).
pub trait OutputSink {
    fn name(&self) -> &str;
    fn accept(&mut self, snapshot: &Arc<TargetSnapshot>, now_ms: u64) -> SinkResult<()>;
}

/// Rate-limited fan-out of snapshots to every registered sink.
pub struct OutputDispatcher {
    interval_ms: u64,
    last_emit_ms: Option<u64>,
    sinks: Vec<Box<dyn OutputSink>>,
    metrics: Arc<PipelineMetrics>,
    logger: LogManager,
}

impl OutputDispatcher {
    pub fn new(config: &PipelineConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            interval_ms: config.output_interval_ms,
            last_emit_ms: None,
            sinks: Vec::new(),
            metrics,
            logger: LogManager::new("rd03d::output"),
        }
    }

    pub fn register(&mut self, sink: Box<dyn OutputSink>) {
        self.logger.record(&format!("registered sink {}", sink.name()));
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Emits unless the previous emission was less than the configured
    /// interval ago. `now_ms` must come from a monotonic clock.
    pub fn maybe_emit(&mut self, snapshot: &Arc<TargetSnapshot>, now_ms: u64) -> bool {
        if let Some(last) = self.last_emit_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return false;
            }
        }
        self.last_emit_ms = Some(now_ms);

        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.accept(snapshot, now_ms) {
                self.metrics.record_sink_failure();
                self.logger
                    .warn(&format!("sink {} failed: {}", sink.name(), err));
            }
        }
        self.metrics.record_emission();
        true
    }
}
