mod bus;
mod config;
mod lsm6dsl;
mod monitor;
mod sim;
mod telemetry;

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::bus::SerialBridge;
use crate::config::{AnalysisMode, MonitorConfig, SourceConfig};
use crate::lsm6dsl::{Lsm6dsl, OutputDataRate, SensorConfig};
use crate::monitor::plot::{render_spectrum_png, render_waveform_png, PlotStyle};
use crate::monitor::{
    Acquired, EpochOutcome, MotionPipeline, SampleAcquisition, SampleSource, SampleTicker,
    SensorChannel,
};
use crate::sim::SimSource;
use crate::telemetry::{IndicatorSink, LogIndicators, Reporter};

fn main() -> Result<()> {
    env_logger::init();

    let cfg = match std::env::args().nth(1).as_deref() {
        Some("--peak-demo") => MonitorConfig::peak_demo(),
        Some(path) => MonitorConfig::load(Path::new(path))?,
        None => MonitorConfig::default(),
    };
    cfg.validate()?;

    info!(
        "movement monitor starting: {} Hz, {} sample window, fft {}, {:?} mode",
        cfg.sample_rate_hz,
        cfg.window_len(),
        cfg.fft_size,
        cfg.analysis_mode
    );

    let source = open_source(&cfg)?;
    run(&cfg, source)
}

fn open_source(cfg: &MonitorConfig) -> Result<Box<dyn SampleSource>> {
    match &cfg.source {
        SourceConfig::Sim { profile } => {
            info!("using simulated sensor ({profile:?} profile)");
            Ok(Box::new(SimSource::new(
                profile.profile(),
                cfg.sample_rate_hz,
            )))
        }
        SourceConfig::Serial { port, baud } => {
            let bridge = match SerialBridge::open(port, *baud) {
                Ok(bridge) => bridge,
                Err(err) => diagnostic_loop(err),
            };
            let odr = OutputDataRate::from_hz(cfg.sample_rate_hz)
                .context("sample rate has no matching sensor output data rate")?;
            let sensor_cfg = SensorConfig {
                odr,
                accel_scale: cfg.accel_scale,
                gyro_dps_per_lsb: cfg.gyro_dps_per_lsb,
                enable_gyro: cfg.analysis_mode == AnalysisMode::Bands,
            };
            match Lsm6dsl::init(bridge, &sensor_cfg) {
                Ok(sensor) => Ok(Box::new(sensor)),
                Err(err) => diagnostic_loop(err),
            }
        }
    }
}

/// Terminal state for a fatal startup failure: report it forever, never
/// enter the sampling loop.
fn diagnostic_loop(err: impl std::fmt::Display) -> ! {
    loop {
        error!("sensor init failed: {err}");
        thread::sleep(Duration::from_secs(1));
    }
}

fn run(cfg: &MonitorConfig, source: Box<dyn SampleSource>) -> Result<()> {
    let mut pipeline = MotionPipeline::new(cfg)?;
    let mut acquisition = SampleAcquisition::new(source, cfg.read_failure_policy);
    let mut reporter = Reporter::new(
        std::io::stdout(),
        cfg.telemetry,
        cfg.analysis_mode == AnalysisMode::Peak,
    );
    let mut indicators = LogIndicators::default();
    if let Some(dir) = &cfg.snapshot_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
    }

    let period = Duration::from_secs_f32(cfg.sample_period_secs());
    let ticker = SampleTicker::start(period);
    let idle = (period / 16).max(Duration::from_micros(200));

    loop {
        if !ticker.take() {
            thread::sleep(idle);
            continue;
        }

        // the bus transaction runs synchronously here; a tick arriving
        // before it finishes is coalesced by the ticker
        match acquisition.acquire() {
            Acquired::Sample {
                accel_mag,
                gyro_mag,
            } => {
                let smoothed = pipeline.ingest(accel_mag, gyro_mag);
                reporter.sample(accel_mag, smoothed)?;
            }
            Acquired::Skipped => {}
            Acquired::Invalidated => pipeline.invalidate_epoch(),
        }

        match pipeline.poll_epoch() {
            Ok(Some(outcome)) => {
                reporter.epoch(&outcome)?;
                reporter.flush()?;
                if let EpochOutcome::Classified(state) = &outcome {
                    indicators.set(state.tremor, state.dyskinesia, state.freeze);
                }
                if let Some(dir) = &cfg.snapshot_dir {
                    if let Err(err) = write_snapshots(dir, outcome.epoch(), &pipeline, cfg) {
                        warn!("snapshot rendering failed: {err}");
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warn!("epoch analysis skipped: {err}"),
        }
    }
}

fn write_snapshots(
    dir: &Path,
    epoch: u64,
    pipeline: &MotionPipeline,
    cfg: &MonitorConfig,
) -> Result<()> {
    let style = PlotStyle::default();
    if let Some(frame) = pipeline.latest_accel_frame() {
        let png = render_waveform_png(frame, cfg.sample_rate_hz, "accel window", &style)?;
        fs::write(dir.join(format!("epoch{epoch:05}_accel_wave.png")), png)?;
    }
    for channel in [SensorChannel::Accel, SensorChannel::Gyro] {
        if let Some(spectrum) = pipeline.latest_spectrum(channel) {
            let bands = pipeline.bands_for(channel);
            let (label, name) = match channel {
                SensorChannel::Accel => (
                    "accel spectrum",
                    format!("epoch{epoch:05}_accel_spectrum.png"),
                ),
                SensorChannel::Gyro => {
                    ("gyro spectrum", format!("epoch{epoch:05}_gyro_spectrum.png"))
                }
            };
            let png = render_spectrum_png(spectrum, &bands, label, &style)?;
            fs::write(dir.join(name), png)?;
        }
    }
    Ok(())
}
