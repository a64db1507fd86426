use serde::{Deserialize, Serialize};

/// Fixed classification thresholds. All of these are plain configuration
/// values so they can be tuned from a config file without a rebuild.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    /// Gyro tremor-band power above which tremor is considered present.
    pub tremor_power: f32,
    /// Gyro dyskinesia-band power above which dyskinesia is considered present.
    pub dyskinesia_power: f32,
    /// Accel walking-band power below which gait is considered absent.
    pub walk_power: f32,
    /// Freeze-candidate to walking power ratio above which gait freezing is suspected.
    pub freeze_ratio: f32,
    /// Multiplicative margin one band must exceed the other to be judged dominant.
    pub dominance_margin: f32,
    /// Additive guard in the freeze-ratio denominator. Its magnitude shapes the
    /// ratio's sensitivity near zero walking power; keep it additive.
    pub freeze_epsilon: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tremor_power: 5.0,
            dyskinesia_power: 5.0,
            walk_power: 5.0,
            freeze_ratio: 3.0,
            dominance_margin: 1.2,
            freeze_epsilon: 1e-4,
        }
    }
}

/// Band powers feeding one classification pass.
#[derive(Clone, Copy, Debug)]
pub struct BandReadings {
    pub walk: f32,
    pub fog: f32,
    pub tremor: f32,
    pub dyskinesia: f32,
}

/// Symptom flags and derived quantities for one epoch.
///
/// Replaced wholesale once per epoch, never patched field by field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClassificationState {
    pub epoch: u64,
    pub tremor: bool,
    pub dyskinesia: bool,
    pub freeze: bool,
    pub freeze_ratio: f32,
    pub walk_power: f32,
    pub fog_power: f32,
    pub tremor_power: f32,
    pub dyskinesia_power: f32,
}

pub struct Classifier {
    thresholds: Thresholds,
}

impl Classifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Resolve the symptom state for one epoch.
    ///
    /// Freezing takes priority and may co-fire with tremor. In the non-freeze
    /// branch tremor and dyskinesia are mutually exclusive: with a dominance
    /// margin above 1 the two conditions cannot both hold.
    pub fn classify(&self, epoch: u64, readings: &BandReadings) -> ClassificationState {
        let t = &self.thresholds;
        let freeze_ratio = readings.fog / (readings.walk + t.freeze_epsilon);
        let tremor_present = readings.tremor > t.tremor_power;
        let dysk_present = readings.dyskinesia > t.dyskinesia_power;
        let low_walk = readings.walk < t.walk_power;
        let freezing = freeze_ratio > t.freeze_ratio && low_walk && !dysk_present;

        let mut state = ClassificationState {
            epoch,
            freeze_ratio,
            walk_power: readings.walk,
            fog_power: readings.fog,
            tremor_power: readings.tremor,
            dyskinesia_power: readings.dyskinesia,
            ..ClassificationState::default()
        };

        if freezing {
            state.freeze = true;
            if tremor_present {
                state.tremor = true;
            }
        } else {
            state.tremor = low_walk
                && tremor_present
                && readings.tremor > readings.dyskinesia * t.dominance_margin;
            state.dyskinesia = low_walk
                && dysk_present
                && readings.dyskinesia > readings.tremor * t.dominance_margin;
            debug_assert!(
                !(state.tremor && state.dyskinesia),
                "dominance margin must keep tremor and dyskinesia exclusive"
            );
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(Thresholds::default())
    }

    #[test]
    fn strong_walk_never_freezes() {
        // walk=10 means low_walk is false, so the fog/walk ratio is irrelevant.
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 10.0,
                fog: 0.5,
                tremor: 0.0,
                dyskinesia: 0.0,
            },
        );
        assert!(!state.freeze);
        assert!(!state.tremor);
        assert!(!state.dyskinesia);
    }

    #[test]
    fn low_walk_with_high_fog_ratio_freezes() {
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 2.0,
                fog: 8.0,
                tremor: 0.0,
                dyskinesia: 0.0,
            },
        );
        assert!(state.freeze);
        assert!((state.freeze_ratio - 4.0).abs() < 1e-2);
    }

    #[test]
    fn tremor_wins_on_dominance_margin() {
        // 6 > 4 * 1.2 so tremor fires; 4 > 6 * 1.2 fails so dyskinesia stays off.
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 2.0,
                fog: 0.0,
                tremor: 6.0,
                dyskinesia: 4.0,
            },
        );
        assert!(state.tremor);
        assert!(!state.dyskinesia);
        assert!(!state.freeze);
    }

    #[test]
    fn freeze_and_tremor_may_cofire() {
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 1.0,
                fog: 9.0,
                tremor: 8.0,
                dyskinesia: 0.0,
            },
        );
        assert!(state.freeze);
        assert!(state.tremor);
    }

    #[test]
    fn dyskinesia_vetoes_freeze() {
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 1.0,
                fog: 9.0,
                tremor: 0.0,
                dyskinesia: 8.0,
            },
        );
        assert!(!state.freeze);
        assert!(state.dyskinesia);
    }

    #[test]
    fn near_margin_powers_set_neither_flag() {
        // Both present, neither clears the 1.2x margin over the other.
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 2.0,
                fog: 0.0,
                tremor: 6.0,
                dyskinesia: 5.5,
            },
        );
        assert!(!state.tremor);
        assert!(!state.dyskinesia);
    }

    #[test]
    fn zero_walk_power_stays_finite() {
        let state = classifier().classify(
            1,
            &BandReadings {
                walk: 0.0,
                fog: 1.0,
                tremor: 0.0,
                dyskinesia: 0.0,
            },
        );
        assert!(state.freeze_ratio.is_finite());
        assert!(state.freeze);
    }

    #[test]
    fn state_is_replaced_per_epoch() {
        let c = classifier();
        let readings = BandReadings {
            walk: 10.0,
            fog: 0.0,
            tremor: 0.0,
            dyskinesia: 0.0,
        };
        let first = c.classify(1, &readings);
        let second = c.classify(2, &readings);
        assert_eq!(first.epoch, 1);
        assert_eq!(second.epoch, 2);
    }
}
