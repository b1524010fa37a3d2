use crate::workflow::source::{ByteSource, SourceRead};
use anyhow::Context;
use log::{debug, info};
use rd03dcore::telemetry::MetricsSnapshot;
use rd03dcore::RadarPipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const IDLE_PAUSE: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub cycles: u64,
    pub frames: u64,
    pub emissions: u64,
    pub metrics: MetricsSnapshot,
}

/// The cooperative control loop: read, run one pipeline cycle, repeat.
pub struct Runner {
    pipeline: RadarPipeline,
    chunk: Vec<u8>,
    started: Instant,
}

impl Runner {
    /// `read_size` should match the pipeline's per-cycle byte budget so a
    /// fast source cannot outrun the reader's accumulator.
    pub fn new(pipeline: RadarPipeline, read_size: usize) -> Self {
        Self {
            pipeline,
            chunk: vec![0; read_size.max(1)],
            started: Instant::now(),
        }
    }

    pub fn pipeline(&self) -> &RadarPipeline {
        &self.pipeline
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Runs until the source closes, `stop` is raised, or `max_cycles` is hit.
    pub fn execute(
        &mut self,
        source: &mut dyn ByteSource,
        stop: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        while !stop.load(Ordering::Relaxed) {
            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            let read = source
                .read_available(&mut self.chunk)
                .context("reading radar input")?;
            let now = self.now_ms();
            summary.cycles += 1;

            let report = match read {
                SourceRead::Data(count) => self.pipeline.run_cycle(&self.chunk[..count], now),
                SourceRead::Idle => {
                    let report = self.pipeline.run_cycle(&[], now);
                    thread::sleep(IDLE_PAUSE);
                    report
                }
                SourceRead::Closed => {
                    debug!("input closed, draining {} buffered bytes", self.pipeline.buffered());
                    loop {
                        let report = self.pipeline.run_cycle(&[], self.now_ms());
                        summary.frames += report.frames as u64;
                        summary.emissions += u64::from(report.emitted);
                        if report.frames == 0 && report.decode_errors == 0 {
                            break;
                        }
                    }
                    break;
                }
            };
            summary.frames += report.frames as u64;
            summary.emissions += u64::from(report.emitted);
        }

        summary.metrics = self.pipeline.metrics().snapshot();
        info!(
            "control loop finished: cycles={} frames={} emissions={} corrupt={} incomplete={}",
            summary.cycles,
            summary.frames,
            summary.emissions,
            summary.metrics.corrupt_frames,
            summary.metrics.incomplete_frames
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_frame_stream;
    use crate::workflow::source::{FileSource, SerialSource};
    use rd03dcore::prelude::PipelineConfig;
    use std::io::{self, Cursor, Read};
    use std::sync::Arc;

    struct QuietLine;

    impl Read for QuietLine {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_millis(1));
            Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
        }
    }

    #[test]
    fn runner_executes_capture_until_closed() {
        let config = PipelineConfig::default();
        let pipeline = RadarPipeline::new(&config).unwrap();
        let mut runner = Runner::new(pipeline, config.cycle_byte_budget());
        let mut source = FileSource::from_reader(Cursor::new(build_frame_stream(1, 30)));
        let stop = AtomicBool::new(false);

        let summary = runner.execute(&mut source, &stop, None).unwrap();
        assert_eq!(summary.frames, 30);
        assert_eq!(summary.metrics.frames, 30);
        assert!(summary.emissions >= 1);
        assert_eq!(runner.pipeline().latest().active_count(), 1);
    }

    #[test]
    fn runner_honours_stop_flag() {
        let config = PipelineConfig::default();
        let pipeline = RadarPipeline::new(&config).unwrap();
        let mut runner = Runner::new(pipeline, config.cycle_byte_budget());
        let mut source = FileSource::from_reader(Cursor::new(build_frame_stream(1, 5)));
        let stop = AtomicBool::new(true);

        let summary = runner.execute(&mut source, &stop, None).unwrap();
        assert_eq!(summary.cycles, 0);
    }

    #[test]
    fn runner_stops_after_max_cycles() {
        let config = PipelineConfig::default();
        let pipeline = RadarPipeline::new(&config).unwrap();
        let mut runner = Runner::new(pipeline, config.cycle_byte_budget());
        let mut source = FileSource::from_reader(Cursor::new(build_frame_stream(1, 100)));
        let stop = AtomicBool::new(false);

        let summary = runner.execute(&mut source, &stop, Some(2)).unwrap();
        assert_eq!(summary.cycles, 2);
    }

    #[test]
    fn quiet_uart_keeps_the_loop_cycling() {
        let config = PipelineConfig::default();
        let pipeline = RadarPipeline::new(&config).unwrap();
        let mut runner = Runner::new(pipeline, config.cycle_byte_budget());
        let mut source = SerialSource::from_port(QuietLine);
        let stop = AtomicBool::new(false);

        let summary = runner.execute(&mut source, &stop, Some(3)).unwrap();
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn stop_request_ends_a_run_on_a_quiet_uart() {
        let config = PipelineConfig::default();
        let pipeline = RadarPipeline::new(&config).unwrap();
        let mut runner = Runner::new(pipeline, config.cycle_byte_budget());
        let mut source = SerialSource::from_port(QuietLine);
        let stop = Arc::new(AtomicBool::new(false));

        let trigger = stop.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.store(true, Ordering::Relaxed);
        });
        let summary = runner.execute(&mut source, &stop, None).unwrap();
        stopper.join().unwrap();
        assert!(summary.cycles >= 1);
        assert_eq!(summary.frames, 0);
    }
}
