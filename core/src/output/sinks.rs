use crate::output::dispatcher::OutputSink;
use crate::prelude::{SinkError, SinkResult};
use crate::protocol::{TargetRecord, TargetSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Human-readable console output, one line per active target.
pub struct SerialSink<W: Write> {
    writer: W,
}

impl<W: Write> SerialSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn format(snapshot: &TargetSnapshot) -> String {
        let mut text = String::new();
        for target in snapshot.active() {
            let _ = writeln!(
                text,
                "T{} x={:.0}mm y={:.0}mm v={:.0}cm/s d={:.0}mm a={:.1}deg",
                target.slot,
                target.x,
                target.y,
                target.speed,
                target.distance_mm(),
                target.angle_deg()
            );
        }
        if text.is_empty() {
            text.push_str("no targets\n");
        }
        text
    }
}

impl<W: Write> OutputSink for SerialSink<W> {
    fn name(&self) -> &str {
        "serial"
    }

    fn accept(&mut self, snapshot: &Arc<TargetSnapshot>, _now_ms: u64) -> SinkResult<()> {
        self.writer.write_all(Self::format(snapshot).as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Hands snapshots to the web bridge through a watch channel.
pub struct WebSink {
    sender: watch::Sender<Arc<TargetSnapshot>>,
}

impl WebSink {
    pub fn new(slots: usize) -> (Self, watch::Receiver<Arc<TargetSnapshot>>) {
        let (sender, receiver) = watch::channel(Arc::new(TargetSnapshot::empty(slots)));
        (Self { sender }, receiver)
    }
}

impl OutputSink for WebSink {
    fn name(&self) -> &str {
        "web"
    }

    fn accept(&mut self, snapshot: &Arc<TargetSnapshot>, _now_ms: u64) -> SinkResult<()> {
        self.sender
            .send(snapshot.clone())
            .map_err(|_| SinkError::Unavailable("no web subscribers".into()))
    }
}

/// What happens to the log file once it reaches its size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRollover {
    /// Start the same file over from empty.
    #[default]
    Truncate,
    /// Move the full file to `<path>.1`, replacing any older copy.
    Rotate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSinkConfig {
    pub interval_ms: u64,
    pub max_file_size: u64,
    pub rollover: LogRollover,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_file_size: 100 * 1024,
            rollover: LogRollover::Truncate,
        }
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp_ms: u64,
    sequence: u64,
    targets: Vec<&'a TargetRecord>,
}

/// Append-only JSON-lines log with its own cadence and size limit.
pub struct LogFileSink {
    path: PathBuf,
    config: LogSinkConfig,
    last_write_ms: Option<u64>,
}

impl LogFileSink {
    pub fn new(path: impl Into<PathBuf>, config: LogSinkConfig) -> Self {
        Self {
            path: path.into(),
            config,
            last_write_ms: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".1");
        PathBuf::from(name)
    }

    fn roll_if_needed(&self, incoming: u64) -> SinkResult<()> {
        let current = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if current + incoming <= self.config.max_file_size {
            return Ok(());
        }
        match self.config.rollover {
            LogRollover::Truncate => {
                OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .open(&self.path)?;
            }
            LogRollover::Rotate => fs::rename(&self.path, self.rotated_path())?,
        }
        Ok(())
    }

    fn classify(&self, err: io::Error) -> SinkError {
        if err.kind() == io::ErrorKind::NotFound {
            SinkError::Unavailable(format!("{}: {}", self.path.display(), err))
        } else {
            SinkError::WriteFailed(err)
        }
    }
}

impl OutputSink for LogFileSink {
    fn name(&self) -> &str {
        "log"
    }

    fn accept(&mut self, snapshot: &Arc<TargetSnapshot>, now_ms: u64) -> SinkResult<()> {
        if let Some(last) = self.last_write_ms {
            if now_ms.saturating_sub(last) < self.config.interval_ms {
                return Ok(());
            }
        }

        let line = LogLine {
            timestamp_ms: snapshot.timestamp_ms(),
            sequence: snapshot.sequence(),
            targets: snapshot.active().collect(),
        };
        let mut bytes = serde_json::to_vec(&line).map_err(io::Error::from)?;
        bytes.push(b'\n');
        if bytes.len() as u64 > self.config.max_file_size {
            return Err(SinkError::WriteFailed(io::Error::new(
                io::ErrorKind::InvalidData,
                "log line larger than max_file_size",
            )));
        }

        self.roll_if_needed(bytes.len() as u64)
            .map_err(|err| match err {
                SinkError::WriteFailed(io_err) => self.classify(io_err),
                other => other,
            })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.classify(err))?;
        file.write_all(&bytes)?;
        self.last_write_ms = Some(now_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot(sequence: u64, targets: Vec<TargetRecord>) -> Arc<TargetSnapshot> {
        Arc::new(TargetSnapshot::new(sequence, sequence * 100, targets))
    }

    #[test]
    fn serial_sink_prints_active_targets() {
        let mut sink = SerialSink::new(Vec::new());
        let snap = snapshot(
            1,
            vec![
                TargetRecord::new(0, 0.0, 1000.0, -12.0, 360.0),
                TargetRecord::empty(1),
            ],
        );
        sink.accept(&snap, 0).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "T0 x=0mm y=1000mm v=-12cm/s d=1000mm a=0.0deg\n");
    }

    #[test]
    fn serial_sink_reports_empty_scene() {
        let text = SerialSink::<Vec<u8>>::format(&TargetSnapshot::empty(2));
        assert_eq!(text, "no targets\n");
    }

    #[test]
    fn web_sink_publishes_latest_snapshot() {
        let (mut sink, receiver) = WebSink::new(1);
        let snap = snapshot(4, vec![TargetRecord::new(0, 1.0, 2.0, 0.0, 0.0)]);
        sink.accept(&snap, 0).unwrap();
        assert_eq!(receiver.borrow().sequence(), 4);
    }

    #[test]
    fn web_sink_without_subscribers_is_unavailable() {
        let (mut sink, receiver) = WebSink::new(1);
        drop(receiver);
        let result = sink.accept(&snapshot(1, vec![]), 0);
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
    }

    #[test]
    fn log_sink_enforces_its_own_interval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("radar.log");
        let mut sink = LogFileSink::new(&path, LogSinkConfig::default());

        sink.accept(&snapshot(1, vec![]), 0).unwrap();
        sink.accept(&snapshot(2, vec![]), 1_000).unwrap();
        sink.accept(&snapshot(3, vec![]), 5_000).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"sequence\":3"));
    }

    #[test]
    fn log_sink_truncates_at_size_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("radar.log");
        let config = LogSinkConfig {
            interval_ms: 0,
            max_file_size: 200,
            rollover: LogRollover::Truncate,
        };
        let mut sink = LogFileSink::new(&path, config);
        let target = TargetRecord::new(0, 10.0, 20.0, 0.0, 0.0);

        for sequence in 0..10 {
            sink.accept(&snapshot(sequence, vec![target]), sequence)
                .unwrap();
            assert!(fs::metadata(&path).unwrap().len() <= 200);
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.lines().last().unwrap().contains("\"sequence\":9"));
    }

    #[test]
    fn log_sink_rotates_full_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("radar.log");
        let config = LogSinkConfig {
            interval_ms: 0,
            max_file_size: 200,
            rollover: LogRollover::Rotate,
        };
        let mut sink = LogFileSink::new(&path, config);
        let target = TargetRecord::new(0, 10.0, 20.0, 0.0, 0.0);
        for sequence in 0..10 {
            sink.accept(&snapshot(sequence, vec![target]), sequence)
                .unwrap();
        }
        assert!(sink.rotated_path().exists());
        assert!(fs::metadata(&path).unwrap().len() <= 200);
    }

    #[test]
    fn log_sink_in_missing_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("radar.log");
        let mut sink = LogFileSink::new(path, LogSinkConfig::default());
        let result = sink.accept(&snapshot(1, vec![]), 0);
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
    }

    #[test]
    fn log_sink_write_error_is_reported_and_retried() {
        let dir = tempdir().unwrap();
        let mut sink = LogFileSink::new(dir.path(), LogSinkConfig::default());

        let result = sink.accept(&snapshot(1, vec![]), 0);
        assert!(matches!(result, Err(SinkError::WriteFailed(_))));
        assert_eq!(sink.last_write_ms, None);

        let retry = sink.accept(&snapshot(2, vec![]), 100);
        assert!(matches!(retry, Err(SinkError::WriteFailed(_))));
        assert_eq!(sink.last_write_ms, None);
    }
}
