use crate::output::{OutputDispatcher, OutputSink};
use crate::prelude::{ConfigError, PipelineConfig};
use crate::processing::{FrameDecoder, FrameReader, TargetTracker};
use crate::protocol::TargetSnapshot;
use crate::telemetry::{LogManager, PipelineMetrics};
use std::sync::Arc;

/// Outcome of one control-loop iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub frames: usize,
    pub decode_errors: usize,
    pub emitted: bool,
}

/// Reader, decoder, tracker and dispatcher wired in sequence.
pub struct RadarPipeline {
    reader: FrameReader,
    decoder: FrameDecoder,
    tracker: TargetTracker,
    dispatcher: OutputDispatcher,
    metrics: Arc<PipelineMetrics>,
    latest: Arc<TargetSnapshot>,
    pending: bool,
    logger: LogManager,
}

impl RadarPipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = Arc::new(PipelineMetrics::new());
        Ok(Self {
            reader: FrameReader::new(config, metrics.clone()),
            decoder: FrameDecoder::new(config),
            tracker: TargetTracker::new(config),
            dispatcher: OutputDispatcher::new(config, metrics.clone()),
            metrics,
            latest: Arc::new(TargetSnapshot::empty(config.snapshot_len())),
            pending: false,
            logger: LogManager::new("rd03d::pipeline"),
        })
    }

    pub fn register_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.dispatcher.register(sink);
    }

    /// Ingests `bytes`, tracks every frame the reader yields this cycle and
    /// hands the newest snapshot to the dispatcher. Never fails.
    pub fn run_cycle(&mut self, bytes: &[u8], now_ms: u64) -> CycleReport {
        let mut report = CycleReport::default();

        for frame in self.reader.poll_bytes(bytes) {
            match self.decoder.decode(&frame) {
                Ok(records) => {
                    self.latest = Arc::new(self.tracker.update(&records, now_ms));
                    self.metrics.record_snapshot();
                    self.pending = true;
                    report.frames += 1;
                }
                Err(err) => {
                    self.metrics.record_decode_error();
                    report.decode_errors += 1;
                    self.logger.detail(&format!("discarding frame: {}", err));
                }
            }
        }

        if self.pending && self.dispatcher.maybe_emit(&self.latest, now_ms) {
            self.pending = false;
            report.emitted = true;
        }
        report
    }

    pub fn latest(&self) -> Arc<TargetSnapshot> {
        self.latest.clone()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Bytes waiting in the reader for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.reader.buffered()
    }
}
