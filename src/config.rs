use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::lsm6dsl::{AccelScale, OutputDataRate, GYRO_DPS_PER_LSB_250};
use crate::monitor::acquisition::ReadFailurePolicy;
use crate::monitor::bands::{
    Band, SensorChannel, BAND_DYSKINESIA, BAND_FOG, BAND_TREMOR, BAND_WALK,
};
use crate::monitor::classifier::Thresholds;
use crate::monitor::error::MonitorError;
use crate::sim::SimProfileKind;
use crate::telemetry::TelemetryFormat;

/// The band table the classifier is built around: walking and
/// freeze-candidate energy on the accelerometer, tremor and dyskinesia on
/// the gyroscope. Edge ownership matters: 3.0 Hz belongs to walk, 5.0 Hz to
/// tremor, and the last band per channel is closed on both ends.
pub static CANONICAL_BANDS: Lazy<Vec<Band>> = Lazy::new(|| {
    vec![
        Band {
            channel: SensorChannel::Accel,
            name: BAND_WALK.into(),
            low_hz: 0.5,
            high_hz: 3.0,
            low_inclusive: true,
            high_inclusive: true,
        },
        Band {
            channel: SensorChannel::Accel,
            name: BAND_FOG.into(),
            low_hz: 3.0,
            high_hz: 8.0,
            low_inclusive: false,
            high_inclusive: true,
        },
        Band {
            channel: SensorChannel::Gyro,
            name: BAND_TREMOR.into(),
            low_hz: 3.0,
            high_hz: 5.0,
            low_inclusive: true,
            high_inclusive: true,
        },
        Band {
            channel: SensorChannel::Gyro,
            name: BAND_DYSKINESIA.into(),
            low_hz: 5.0,
            high_hz: 7.0,
            low_inclusive: false,
            high_inclusive: true,
        },
    ]
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Single-channel dominant-frequency report.
    Peak,
    /// Dual-channel four-band symptom classifier.
    Bands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochTriggerKind {
    Count,
    Time,
}

/// Where samples come from.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Sim {
        #[serde(default)]
        profile: SimProfileKind,
    },
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud: u32,
    },
}

fn default_baud_rate() -> u32 {
    115_200
}

/// Everything tunable without a rebuild, loadable from a JSON file.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sample_rate_hz: f32,
    pub window_seconds: f32,
    /// Explicit analysis window length; computed from rate and seconds when
    /// absent.
    pub window_samples: Option<usize>,
    pub fft_size: usize,
    pub moving_average_len: usize,
    pub analysis_mode: AnalysisMode,
    pub epoch_trigger: EpochTriggerKind,
    /// Peak mode only: minimum magnitude for a bin to count as dominant.
    pub noise_floor: f32,
    pub bands: Vec<Band>,
    pub thresholds: Thresholds,
    pub accel_scale: AccelScale,
    pub gyro_dps_per_lsb: f32,
    pub read_failure_policy: ReadFailurePolicy,
    pub telemetry: TelemetryFormat,
    pub source: SourceConfig,
    /// When set, per-epoch waveform and spectrum PNGs are written here.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 52.0,
            window_seconds: 3.0,
            window_samples: None,
            fft_size: 256,
            moving_average_len: 10,
            analysis_mode: AnalysisMode::Bands,
            epoch_trigger: EpochTriggerKind::Time,
            noise_floor: 1.0,
            bands: CANONICAL_BANDS.clone(),
            thresholds: Thresholds::default(),
            accel_scale: AccelScale::G2,
            gyro_dps_per_lsb: GYRO_DPS_PER_LSB_250,
            read_failure_policy: ReadFailurePolicy::HoldLast,
            telemetry: TelemetryFormat::Human,
            source: SourceConfig::Sim {
                profile: SimProfileKind::Walking,
            },
            snapshot_dir: None,
        }
    }
}

impl MonitorConfig {
    /// The single-channel dominant-frequency demo: 104 Hz, ±8 g, window tied
    /// to the transform size, teleplot output.
    pub fn peak_demo() -> Self {
        Self {
            sample_rate_hz: 104.0,
            window_samples: Some(256),
            analysis_mode: AnalysisMode::Peak,
            epoch_trigger: EpochTriggerKind::Count,
            accel_scale: AccelScale::G8,
            telemetry: TelemetryFormat::Teleplot,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    /// Analysis window length in samples.
    pub fn window_len(&self) -> usize {
        self.window_samples
            .unwrap_or_else(|| (self.sample_rate_hz * self.window_seconds).round() as usize)
    }

    pub fn sample_period_secs(&self) -> f32 {
        1.0 / self.sample_rate_hz
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.sample_rate_hz <= 0.0 {
            return Err(MonitorError::InvalidSampleRate);
        }
        if self.window_seconds <= 0.0 || self.window_len() == 0 {
            return Err(MonitorError::InvalidWindow);
        }
        if self.moving_average_len == 0 {
            return Err(MonitorError::InvalidMovingAverage);
        }
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(MonitorError::FftSizeNotPowerOfTwo(self.fft_size));
        }
        if self.window_len() > self.fft_size {
            return Err(MonitorError::WindowExceedsFft {
                needed: self.window_len(),
                fft_size: self.fft_size,
            });
        }
        if self.thresholds.freeze_epsilon <= 0.0 {
            return Err(MonitorError::InvalidThreshold("freeze_epsilon"));
        }
        if self.thresholds.dominance_margin <= 1.0 {
            return Err(MonitorError::InvalidThreshold("dominance_margin"));
        }
        for band in &self.bands {
            if band.low_hz < 0.0 || band.high_hz <= band.low_hz {
                return Err(MonitorError::EmptyBand {
                    name: band.name.clone(),
                    low_hz: band.low_hz,
                    high_hz: band.high_hz,
                });
            }
        }
        if self.analysis_mode == AnalysisMode::Bands {
            for (name, channel) in [
                (BAND_WALK, SensorChannel::Accel),
                (BAND_FOG, SensorChannel::Accel),
                (BAND_TREMOR, SensorChannel::Gyro),
                (BAND_DYSKINESIA, SensorChannel::Gyro),
            ] {
                if !self
                    .bands
                    .iter()
                    .any(|b| b.name == name && b.channel == channel)
                {
                    return Err(MonitorError::MissingBand(name));
                }
            }
        }
        if matches!(self.source, SourceConfig::Serial { .. })
            && OutputDataRate::from_hz(self.sample_rate_hz).is_none()
        {
            return Err(MonitorError::UnsupportedOdr(self.sample_rate_hz));
        }
        Ok(())
    }
}
