use std::time::Duration;

use log::debug;

use crate::config::{AnalysisMode, EpochTriggerKind, MonitorConfig};
use crate::monitor::bands::{
    band_power, dominant_frequency, Band, SensorChannel, BAND_DYSKINESIA, BAND_FOG, BAND_TREMOR,
    BAND_WALK,
};
use crate::monitor::classifier::{BandReadings, ClassificationState, Classifier};
use crate::monitor::error::MonitorError;
use crate::monitor::spectrum::{MagnitudeSpectrum, SpectrumBuilder};
use crate::monitor::window::{AnalysisWindow, Clock, EpochTrigger, MovingAverage, SystemClock};

/// Result of one analysis epoch.
#[derive(Clone, Debug)]
pub enum EpochOutcome {
    /// Peak-frequency mode: the dominant accel frequency, if any cleared the
    /// noise floor.
    Peak {
        epoch: u64,
        dominant_hz: Option<f32>,
    },
    /// Band mode: a freshly classified symptom state.
    Classified(ClassificationState),
    /// The epoch was poisoned by failed sensor reads; classification skipped.
    Invalidated { epoch: u64 },
}

impl EpochOutcome {
    pub fn epoch(&self) -> u64 {
        match self {
            EpochOutcome::Peak { epoch, .. } => *epoch,
            EpochOutcome::Classified(state) => state.epoch,
            EpochOutcome::Invalidated { epoch } => *epoch,
        }
    }
}

/// High level pipeline: aggregates samples into windows and turns each epoch
/// into a spectrum, band powers and a classification.
pub struct MotionPipeline {
    mode: AnalysisMode,
    sample_rate_hz: f32,
    noise_floor: f32,
    bands: Vec<Band>,
    accel_ma: MovingAverage,
    accel_window: AnalysisWindow,
    gyro_window: AnalysisWindow,
    builder: SpectrumBuilder,
    classifier: Classifier,
    trigger: EpochTrigger,
    clock: Box<dyn Clock>,
    epoch: u64,
    poisoned: bool,
    state: Option<ClassificationState>,
    last_accel_frame: Option<Vec<f32>>,
    last_accel_spectrum: Option<MagnitudeSpectrum>,
    last_gyro_spectrum: Option<MagnitudeSpectrum>,
}

impl MotionPipeline {
    pub fn new(cfg: &MonitorConfig) -> Result<Self, MonitorError> {
        Self::with_clock(cfg, Box::new(SystemClock))
    }

    /// Build the pipeline against an injected clock so epoch timing is
    /// controllable in tests.
    pub fn with_clock(cfg: &MonitorConfig, clock: Box<dyn Clock>) -> Result<Self, MonitorError> {
        cfg.validate()?;
        let window_len = cfg.window_len();
        let trigger = match cfg.epoch_trigger {
            EpochTriggerKind::Count => EpochTrigger::count(window_len),
            EpochTriggerKind::Time => {
                EpochTrigger::time(Duration::from_secs_f32(cfg.window_seconds), clock.now())
            }
        };
        Ok(Self {
            mode: cfg.analysis_mode,
            sample_rate_hz: cfg.sample_rate_hz,
            noise_floor: cfg.noise_floor,
            bands: cfg.bands.clone(),
            accel_ma: MovingAverage::new(cfg.moving_average_len)?,
            accel_window: AnalysisWindow::new(window_len)?,
            gyro_window: AnalysisWindow::new(window_len)?,
            builder: SpectrumBuilder::new(cfg.fft_size)?,
            classifier: Classifier::new(cfg.thresholds),
            trigger,
            clock,
            epoch: 0,
            poisoned: false,
            state: None,
            last_accel_frame: None,
            last_accel_spectrum: None,
            last_gyro_spectrum: None,
        })
    }

    /// Feed one tick's magnitudes into the windows. Returns the smoothed
    /// accel magnitude for low-latency telemetry.
    pub fn ingest(&mut self, accel_mag: f32, gyro_mag: f32) -> f32 {
        let smoothed = self.accel_ma.push(accel_mag);
        self.accel_window.push(accel_mag);
        self.gyro_window.push(gyro_mag);
        self.trigger.on_sample();
        smoothed
    }

    /// Poison the current epoch; the next fire reports it invalid instead of
    /// classifying stale data.
    pub fn invalidate_epoch(&mut self) {
        self.poisoned = true;
    }

    /// Check the epoch trigger and, if it fired, run the spectral analysis.
    ///
    /// The window buffers keep sliding either way; only the trigger resets.
    pub fn poll_epoch(&mut self) -> Result<Option<EpochOutcome>, MonitorError> {
        if !self.trigger.poll(self.clock.as_ref()) {
            return Ok(None);
        }
        self.epoch += 1;
        if self.poisoned {
            self.poisoned = false;
            debug!("epoch {}: invalidated by failed reads", self.epoch);
            return Ok(Some(EpochOutcome::Invalidated { epoch: self.epoch }));
        }
        match self.mode {
            AnalysisMode::Peak => {
                let frame = self.accel_window.snapshot()?;
                let spectrum = self.builder.compute(&frame, self.sample_rate_hz)?;
                let dominant_hz = dominant_frequency(&spectrum, self.noise_floor);
                debug!("epoch {}: dominant {:?} Hz", self.epoch, dominant_hz);
                self.last_accel_frame = Some(frame);
                self.last_accel_spectrum = Some(spectrum);
                Ok(Some(EpochOutcome::Peak {
                    epoch: self.epoch,
                    dominant_hz,
                }))
            }
            AnalysisMode::Bands => {
                let accel_frame = self.accel_window.snapshot()?;
                let gyro_frame = self.gyro_window.snapshot()?;
                let accel = self.builder.compute(&accel_frame, self.sample_rate_hz)?;
                let gyro = self.builder.compute(&gyro_frame, self.sample_rate_hz)?;
                let readings = BandReadings {
                    walk: self.named_power(&accel, &gyro, BAND_WALK)?,
                    fog: self.named_power(&accel, &gyro, BAND_FOG)?,
                    tremor: self.named_power(&accel, &gyro, BAND_TREMOR)?,
                    dyskinesia: self.named_power(&accel, &gyro, BAND_DYSKINESIA)?,
                };
                let state = self.classifier.classify(self.epoch, &readings);
                debug!(
                    "epoch {}: walk={:.3} fog={:.3} tremor={:.3} dysk={:.3} ratio={:.3}",
                    self.epoch,
                    readings.walk,
                    readings.fog,
                    readings.tremor,
                    readings.dyskinesia,
                    state.freeze_ratio
                );
                self.state = Some(state);
                self.last_accel_frame = Some(accel_frame);
                self.last_accel_spectrum = Some(accel);
                self.last_gyro_spectrum = Some(gyro);
                Ok(Some(EpochOutcome::Classified(state)))
            }
        }
    }

    fn named_power(
        &self,
        accel: &MagnitudeSpectrum,
        gyro: &MagnitudeSpectrum,
        name: &'static str,
    ) -> Result<f32, MonitorError> {
        let band = self
            .bands
            .iter()
            .find(|b| b.name == name)
            .ok_or(MonitorError::MissingBand(name))?;
        let spectrum = match band.channel {
            SensorChannel::Accel => accel,
            SensorChannel::Gyro => gyro,
        };
        Ok(band_power(spectrum, band))
    }

    /// Latest classification, valid until the next epoch replaces it.
    pub fn latest_state(&self) -> Option<ClassificationState> {
        self.state
    }

    pub fn latest_spectrum(&self, channel: SensorChannel) -> Option<&MagnitudeSpectrum> {
        match channel {
            SensorChannel::Accel => self.last_accel_spectrum.as_ref(),
            SensorChannel::Gyro => self.last_gyro_spectrum.as_ref(),
        }
    }

    pub fn latest_accel_frame(&self) -> Option<&[f32]> {
        self.last_accel_frame.as_deref()
    }

    pub fn bands_for(&self, channel: SensorChannel) -> Vec<Band> {
        self.bands
            .iter()
            .filter(|b| b.channel == channel)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::monitor::window::ManualClock;
    use std::f32::consts::TAU;

    fn bands_config() -> MonitorConfig {
        MonitorConfig {
            epoch_trigger: EpochTriggerKind::Count,
            source: SourceConfig::Sim {
                profile: Default::default(),
            },
            ..MonitorConfig::default()
        }
    }

    fn sine(freq_hz: f32, amp: f32, rate: f32, i: usize) -> f32 {
        amp * (TAU * freq_hz * i as f32 / rate).sin()
    }

    #[test]
    fn count_trigger_epoch_fires_at_exactly_window_len() {
        let cfg = bands_config();
        let w = cfg.window_len();
        let mut pipeline = MotionPipeline::new(&cfg).unwrap();
        for i in 0..w - 1 {
            pipeline.ingest(1.0, 0.0);
            assert!(pipeline.poll_epoch().unwrap().is_none(), "sample {i}");
        }
        pipeline.ingest(1.0, 0.0);
        let outcome = pipeline.poll_epoch().unwrap().expect("epoch must fire");
        assert_eq!(outcome.epoch(), 1);
        // window was exactly full at fire time
        assert_eq!(pipeline.accel_window.len(), w);
    }

    #[test]
    fn tremor_sine_on_gyro_classifies_as_tremor() {
        let cfg = bands_config();
        let w = cfg.window_len();
        let mut pipeline = MotionPipeline::new(&cfg).unwrap();
        let mut outcome = None;
        for i in 0..w {
            // still accel (pure gravity), strong 4 Hz gyro oscillation
            pipeline.ingest(1.0, 30.0 + sine(4.0, 25.0, 52.0, i));
            if let Some(out) = pipeline.poll_epoch().unwrap() {
                outcome = Some(out);
            }
        }
        match outcome.expect("epoch fired") {
            EpochOutcome::Classified(state) => {
                assert!(state.tremor, "tremor flag expected: {state:?}");
                assert!(!state.dyskinesia);
                assert!(!state.freeze);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn time_trigger_before_fill_reports_window_not_full() {
        let clock = ManualClock::new();
        let mut cfg = bands_config();
        cfg.epoch_trigger = EpochTriggerKind::Time;
        let mut pipeline = MotionPipeline::with_clock(&cfg, Box::new(clock.clone())).unwrap();
        // only half the window arrives before the timer elapses
        for _ in 0..cfg.window_len() / 2 {
            pipeline.ingest(1.0, 0.0);
        }
        clock.advance(Duration::from_secs_f32(cfg.window_seconds));
        assert!(matches!(
            pipeline.poll_epoch(),
            Err(MonitorError::WindowNotFull { .. })
        ));
    }

    #[test]
    fn time_trigger_with_full_window_classifies() {
        let clock = ManualClock::new();
        let mut cfg = bands_config();
        cfg.epoch_trigger = EpochTriggerKind::Time;
        let mut pipeline = MotionPipeline::with_clock(&cfg, Box::new(clock.clone())).unwrap();
        for _ in 0..cfg.window_len() {
            pipeline.ingest(1.0, 0.0);
        }
        clock.advance(Duration::from_secs_f32(cfg.window_seconds));
        let outcome = pipeline.poll_epoch().unwrap().expect("epoch fired");
        assert!(matches!(outcome, EpochOutcome::Classified(_)));
        assert!(pipeline.latest_state().is_some());
    }

    #[test]
    fn poisoned_epoch_skips_classification_then_recovers() {
        let cfg = bands_config();
        let w = cfg.window_len();
        let mut pipeline = MotionPipeline::new(&cfg).unwrap();
        for _ in 0..w {
            pipeline.ingest(1.0, 0.0);
        }
        pipeline.invalidate_epoch();
        let outcome = pipeline.poll_epoch().unwrap().expect("epoch fired");
        assert!(matches!(outcome, EpochOutcome::Invalidated { epoch: 1 }));
        assert!(pipeline.latest_state().is_none());
        // next epoch is clean again
        for _ in 0..w {
            pipeline.ingest(1.0, 0.0);
        }
        let outcome = pipeline.poll_epoch().unwrap().expect("epoch fired");
        assert!(matches!(outcome, EpochOutcome::Classified(_)));
    }

    #[test]
    fn peak_mode_reports_dominant_frequency() {
        let mut cfg = MonitorConfig::peak_demo();
        cfg.source = SourceConfig::Sim {
            profile: Default::default(),
        };
        let mut pipeline = MotionPipeline::new(&cfg).unwrap();
        let freq = 20.0 * cfg.sample_rate_hz / cfg.fft_size as f32;
        let mut outcome = None;
        for i in 0..cfg.window_len() {
            pipeline.ingest(1.0 + sine(freq, 0.5, cfg.sample_rate_hz, i), 0.0);
            if let Some(out) = pipeline.poll_epoch().unwrap() {
                outcome = Some(out);
            }
        }
        match outcome.expect("epoch fired") {
            EpochOutcome::Peak { dominant_hz, .. } => {
                let dom = dominant_hz.expect("dominant frequency expected");
                assert!((dom - freq).abs() < 1e-3, "dominant {dom} vs {freq}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn quiet_peak_mode_reports_no_dominant_frequency() {
        let mut cfg = MonitorConfig::peak_demo();
        cfg.source = SourceConfig::Sim {
            profile: Default::default(),
        };
        let mut pipeline = MotionPipeline::new(&cfg).unwrap();
        let mut outcome = None;
        for _ in 0..cfg.window_len() {
            pipeline.ingest(1.0, 0.0);
            if let Some(out) = pipeline.poll_epoch().unwrap() {
                outcome = Some(out);
            }
        }
        match outcome.expect("epoch fired") {
            EpochOutcome::Peak { dominant_hz, .. } => assert!(dominant_hz.is_none()),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
