use anyhow::Context;
use clap::Parser;
use generator::profile::{build_frame_stream_from_config, GeneratorConfig, SceneGenerator};
use generator::stream::SyntheticSource;
use log::{error, info, warn};
use rd03dcore::output::{LogFileSink, SerialSink, WebSink};
use rd03dcore::RadarPipeline;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use web::bridge::WebBridge;
use workflow::config::{ConfigOverrides, NodeConfig};
use workflow::runner::Runner;
use workflow::source::{ByteSource, FileSource, SerialSource};

mod generator;
mod web;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "RD-03D radar node control loop")]
struct Args {
    /// Load the node config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Radar UART device, opened at the configured baud rate
    #[arg(long, conflicts_with_all = ["input", "synthetic"])]
    serial: Option<String>,
    /// Replay a recorded capture file instead of reading the UART
    #[arg(long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,
    /// Feed the pipeline from the built-in scene generator
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Targets in the synthetic scene
    #[arg(long, default_value_t = 1)]
    targets: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = false)]
    multi_target: bool,
    #[arg(long, default_value_t = false)]
    filter: bool,
    /// Override the web bridge port
    #[arg(long)]
    port: Option<u16>,
    #[arg(long, default_value_t = false)]
    no_web: bool,
    /// Enable the log sink, writing to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Stop after this many control-loop cycles
    #[arg(long)]
    cycles: Option<u64>,
    /// Write a synthetic capture file for later replay with --input, then exit
    #[arg(long)]
    capture: Option<PathBuf>,
    #[arg(long, default_value_t = 600)]
    capture_frames: usize,
}

fn spawn_shutdown_listener(stop: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("shutdown".into())
        .spawn(move || {
            let runtime = match TokioBuilder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("creating runtime for signal handling: {}", err);
                    return;
                }
            };
            runtime.block_on(async {
                if let Err(err) = signal::ctrl_c().await {
                    error!("awaiting Ctrl+C: {}", err);
                    return;
                }
                info!("Ctrl+C received, stopping control loop");
                stop.store(true, Ordering::Relaxed);
            });
        });
    if let Err(err) = spawned {
        warn!("shutdown listener unavailable: {}", err);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let base_config = match args.config.as_ref() {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    let overrides = ConfigOverrides {
        serial_device: args.serial.clone(),
        multi_target: args.multi_target,
        filtering: args.filter,
        port: args.port,
        disable_web: args.no_web,
        log_file: args.log_file.clone(),
    };
    let config = base_config.with_overrides(&overrides);
    config.validate()?;

    let generator_config = GeneratorConfig {
        targets: args.targets,
        seed: args.seed,
        checksum: config.radar.checksum,
        ..Default::default()
    };

    if let Some(path) = args.capture.as_ref() {
        let stream = build_frame_stream_from_config(&generator_config, args.capture_frames);
        fs::write(path, &stream)
            .with_context(|| format!("writing capture {}", path.display()))?;
        println!(
            "Capture written -> {} frames, {} bytes, {}",
            args.capture_frames,
            stream.len(),
            path.display()
        );
        return Ok(());
    }

    info!(
        "radar UART {} baud (rx pin {}, tx pin {}), {} mode, filtering {}",
        config.serial.baud_rate,
        config.serial.rx_pin,
        config.serial.tx_pin,
        if config.radar.multi_target {
            "multi-target"
        } else {
            "single-target"
        },
        if config.radar.enable_filtering { "on" } else { "off" }
    );

    let mut pipeline = RadarPipeline::new(&config.radar).context("building radar pipeline")?;
    pipeline.register_sink(Box::new(SerialSink::new(io::stdout())));

    let _bridge = if config.web.enabled {
        let (sink, receiver) = WebSink::new(config.radar.snapshot_len());
        match WebBridge::spawn(config.web.port, receiver, pipeline.metrics()) {
            Ok(bridge) => {
                info!("web bridge listening on http://{}", bridge.address());
                pipeline.register_sink(Box::new(sink));
                Some(bridge)
            }
            Err(err) => {
                warn!("web output disabled: {:#}", err);
                None
            }
        }
    } else {
        None
    };

    if config.logging.enabled {
        let sink = LogFileSink::new(&config.logging.path, config.logging.sink.clone());
        info!("logging targets to {}", sink.path().display());
        pipeline.register_sink(Box::new(sink));
    }

    let device = config.serial.device.as_deref().filter(|_| !args.synthetic);
    let mut source: Box<dyn ByteSource> = match (args.input.as_ref(), device) {
        (Some(path), _) => Box::new(FileSource::open(path)?),
        (None, Some(device)) => {
            info!("reading radar UART {}", device);
            Box::new(SerialSource::open(device, &config.serial)?)
        }
        (None, None) => {
            if !args.synthetic {
                info!("no radar input configured, using the synthetic scene generator");
            }
            Box::new(SyntheticSource::new(
                SceneGenerator::new(generator_config),
                config.serial.bytes_per_second(),
            ))
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(stop.clone());

    let mut runner = Runner::new(pipeline, config.radar.cycle_byte_budget());
    let summary = runner.execute(source.as_mut(), &stop, args.cycles)?;

    println!(
        "Run finished -> cycles {}, frames {}, emissions {}, corrupt {}, incomplete {}, decode errors {}, active targets {}",
        summary.cycles,
        summary.frames,
        summary.emissions,
        summary.metrics.corrupt_frames,
        summary.metrics.incomplete_frames,
        summary.metrics.decode_errors,
        runner.pipeline().latest().active_count()
    );

    Ok(())
}
