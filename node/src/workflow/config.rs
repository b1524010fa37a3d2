use anyhow::Context;
use rd03dcore::output::LogSinkConfig;
use rd03dcore::prelude::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// UART wiring between the host board and the radar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// UART device the radar is wired to, e.g. `/dev/ttyUSB0`.
    pub device: Option<String>,
    pub baud_rate: u32,
    /// Longest a single UART read may wait for data.
    pub read_timeout_ms: u64,
    pub rx_pin: u8,
    pub tx_pin: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: 256_000,
            read_timeout_ms: 10,
            rx_pin: 18,
            tx_pin: 17,
        }
    }
}

impl SerialConfig {
    /// Payload throughput of an 8N1 line.
    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.baud_rate) / 10
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 80,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub path: PathBuf,
    #[serde(flatten)]
    pub sink: LogSinkConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("radar_log.jsonl"),
            sink: LogSinkConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub serial: SerialConfig,
    pub radar: PipelineConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

/// Command-line values that take precedence over the YAML file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub serial_device: Option<String>,
    pub multi_target: bool,
    pub filtering: bool,
    pub port: Option<u16>,
    pub disable_web: bool,
    pub log_file: Option<PathBuf>,
}

impl NodeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading node config {}", path_ref.display()))?;
        let config: NodeConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing node config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(device) = overrides.serial_device.as_ref() {
            self.serial.device = Some(device.clone());
        }
        if overrides.multi_target {
            self.radar.multi_target = true;
        }
        if overrides.filtering {
            self.radar.enable_filtering = true;
        }
        if let Some(port) = overrides.port {
            self.web.port = port;
        }
        if overrides.disable_web {
            self.web.enabled = false;
        }
        if let Some(path) = overrides.log_file.as_ref() {
            self.logging.enabled = true;
            self.logging.path = path.clone();
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.radar.validate().context("validating radar section")?;
        if self.serial.baud_rate == 0 {
            anyhow::bail!("serial.baud_rate must be non-zero");
        }
        if self.serial.read_timeout_ms == 0 {
            anyhow::bail!("serial.read_timeout_ms must be non-zero");
        }
        Ok(())
    }
}
