use crate::workflow::config::SerialConfig;
use anyhow::Context;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

/// Result of asking a source for more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRead {
    Data(usize),
    /// Nothing available right now; try again next cycle.
    Idle,
    /// The stream ended (capture file exhausted).
    Closed,
}

/// Where the control loop gets radar bytes from.
pub trait ByteSource {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<SourceRead>;
}

/// The radar UART, opened 8N1 at the configured baud rate.
///
/// Reads wait at most `read_timeout_ms`; a quiet line reports `Idle` so the
/// control loop keeps cycling and can observe a stop request.
pub struct SerialSource {
    port: Box<dyn Read + Send>,
}

impl SerialSource {
    pub fn open(device: &str, config: &SerialConfig) -> anyhow::Result<Self> {
        let port = serialport::new(device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .with_context(|| {
                format!("opening radar UART {} at {} baud", device, config.baud_rate)
            })?;
        Ok(Self {
            port: Box::new(port),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_port<R: Read + Send + 'static>(port: R) -> Self {
        Self {
            port: Box::new(port),
        }
    }
}

impl ByteSource for SerialSource {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<SourceRead> {
        match self.port.read(buf) {
            Ok(0) => Ok(SourceRead::Idle),
            Ok(count) => Ok(SourceRead::Data(count)),
            Err(err) if is_transient(&err) => Ok(SourceRead::Idle),
            Err(err) => Err(err),
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// A recorded capture replayed in chunks; end of file closes the stream.
pub struct FileSource {
    reader: Box<dyn Read + Send>,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("opening radar input {}", path_ref.display()))?;
        Ok(Self::from_reader(file))
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }
}

impl ByteSource for FileSource {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<SourceRead> {
        match self.reader.read(buf) {
            Ok(0) => Ok(SourceRead::Closed),
            Ok(count) => Ok(SourceRead::Data(count)),
            Err(err) if is_transient(&err) => Ok(SourceRead::Idle),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    /// Replays a fixed sequence of read outcomes, then times out forever.
    struct ScriptedPort(VecDeque<io::Result<Vec<u8>>>);

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
            }
        }
    }

    #[test]
    fn serial_timeout_is_idle_not_closed() {
        let mut source = SerialSource::from_port(ScriptedPort(VecDeque::from(vec![
            Err(io::Error::new(io::ErrorKind::TimedOut, "quiet line")),
            Ok(vec![0xAA, 0xFF, 0x03]),
            Ok(Vec::new()),
        ])));
        let mut buf = [0u8; 8];
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Idle);
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Data(3));
        assert_eq!(&buf[..3], &[0xAA, 0xFF, 0x03]);
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Idle);
    }

    #[test]
    fn serial_hardware_error_is_propagated() {
        let mut source = SerialSource::from_port(ScriptedPort(VecDeque::from(vec![Err(
            io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"),
        )])));
        let mut buf = [0u8; 8];
        assert!(source.read_available(&mut buf).is_err());
    }

    #[test]
    fn missing_uart_is_reported_with_device() {
        let err = SerialSource::open("/nonexistent/ttyRADAR", &SerialConfig::default())
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("/nonexistent/ttyRADAR"));
    }

    #[test]
    fn file_source_reports_close_at_end() {
        let mut source = FileSource::from_reader(Cursor::new(vec![1u8, 2, 3]));
        let mut buf = [0u8; 2];
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Data(2));
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Data(1));
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Closed);
    }

    #[test]
    fn file_source_opens_capture_files() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&[0xAA, 0xFF]).unwrap();
        let mut source = FileSource::open(temp.path()).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(source.read_available(&mut buf).unwrap(), SourceRead::Data(2));
    }

    #[test]
    fn missing_input_is_reported_with_path() {
        let err = FileSource::open("/nonexistent/radar-tty").err().unwrap();
        assert!(format!("{:#}", err).contains("/nonexistent/radar-tty"));
    }
}
