use std::collections::VecDeque;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::monitor::error::MonitorError;

/// Calibrated reading of one triaxial sensor, in physical units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AxisSample {
    /// Euclidean magnitude, the per-channel scalar fed into the windows.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionSample {
    pub accel: AxisSample,
    pub gyro: AxisSample,
}

/// Something that yields the current calibrated axis readings on demand.
pub trait SampleSource {
    fn read(&mut self) -> Result<MotionSample, MonitorError>;
}

/// What to do with the tick when the sensor read fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Skip the tick entirely; the windows do not advance.
    Drop,
    /// Repeat the previous magnitudes so the windows keep their cadence.
    HoldLast,
    /// Poison the current epoch; classification is skipped at the next fire.
    Invalidate,
}

/// Outcome of one acquisition tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Acquired {
    Sample { accel_mag: f32, gyro_mag: f32 },
    Skipped,
    Invalidated,
}

/// Per-tick front end: reads the source, derives scalar magnitudes and
/// applies the configured failure policy.
pub struct SampleAcquisition {
    source: Box<dyn SampleSource>,
    policy: ReadFailurePolicy,
    last: Option<(f32, f32)>,
    failures: u64,
}

impl SampleAcquisition {
    pub fn new(source: Box<dyn SampleSource>, policy: ReadFailurePolicy) -> Self {
        Self {
            source,
            policy,
            last: None,
            failures: 0,
        }
    }

    pub fn acquire(&mut self) -> Acquired {
        match self.source.read() {
            Ok(sample) => {
                let accel_mag = sample.accel.magnitude();
                let gyro_mag = sample.gyro.magnitude();
                self.last = Some((accel_mag, gyro_mag));
                Acquired::Sample {
                    accel_mag,
                    gyro_mag,
                }
            }
            Err(err) => {
                self.failures += 1;
                warn!("sensor read failed ({:?} policy): {err}", self.policy);
                match self.policy {
                    ReadFailurePolicy::Drop => Acquired::Skipped,
                    ReadFailurePolicy::HoldLast => match self.last {
                        Some((accel_mag, gyro_mag)) => Acquired::Sample {
                            accel_mag,
                            gyro_mag,
                        },
                        None => Acquired::Skipped,
                    },
                    ReadFailurePolicy::Invalidate => Acquired::Invalidated,
                }
            }
        }
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Result<MotionSample, MonitorError>>,
}

impl ManualSource {
    pub fn new(readings: impl IntoIterator<Item = Result<MotionSample, MonitorError>>) -> Self {
        Self {
            queue: readings.into_iter().collect(),
        }
    }

}

impl SampleSource for ManualSource {
    fn read(&mut self) -> Result<MotionSample, MonitorError> {
        self.queue
            .pop_front()
            .unwrap_or(Err(MonitorError::SourceExhausted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ax: f32, gx: f32) -> MotionSample {
        MotionSample {
            accel: AxisSample {
                x: ax,
                y: 0.0,
                z: 0.0,
            },
            gyro: AxisSample {
                x: gx,
                y: 0.0,
                z: 0.0,
            },
        }
    }

    #[test]
    fn magnitude_is_l2_norm() {
        let axis = AxisSample {
            x: 3.0,
            y: 4.0,
            z: 12.0,
        };
        assert_eq!(axis.magnitude(), 13.0);
    }

    #[test]
    fn drop_policy_skips_failed_ticks() {
        let source = ManualSource::new(vec![
            Ok(sample(1.0, 2.0)),
            Err(MonitorError::SourceExhausted),
            Ok(sample(3.0, 4.0)),
        ]);
        let mut acq = SampleAcquisition::new(Box::new(source), ReadFailurePolicy::Drop);
        assert!(matches!(acq.acquire(), Acquired::Sample { .. }));
        assert_eq!(acq.acquire(), Acquired::Skipped);
        assert!(matches!(acq.acquire(), Acquired::Sample { .. }));
        assert_eq!(acq.failures(), 1);
    }

    #[test]
    fn hold_last_repeats_previous_magnitudes() {
        let source = ManualSource::new(vec![
            Ok(sample(1.0, 2.0)),
            Err(MonitorError::SourceExhausted),
        ]);
        let mut acq = SampleAcquisition::new(Box::new(source), ReadFailurePolicy::HoldLast);
        let first = acq.acquire();
        let second = acq.acquire();
        assert_eq!(first, second);
        assert_eq!(
            second,
            Acquired::Sample {
                accel_mag: 1.0,
                gyro_mag: 2.0
            }
        );
    }

    #[test]
    fn hold_last_without_history_skips() {
        let source = ManualSource::new(vec![Err(MonitorError::SourceExhausted)]);
        let mut acq = SampleAcquisition::new(Box::new(source), ReadFailurePolicy::HoldLast);
        assert_eq!(acq.acquire(), Acquired::Skipped);
    }

    #[test]
    fn invalidate_policy_poisons_the_epoch() {
        let source = ManualSource::new(vec![Err(MonitorError::SourceExhausted)]);
        let mut acq = SampleAcquisition::new(Box::new(source), ReadFailurePolicy::Invalidate);
        assert_eq!(acq.acquire(), Acquired::Invalidated);
    }
}
