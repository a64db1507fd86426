use serde::{Deserialize, Serialize};

use crate::monitor::spectrum::MagnitudeSpectrum;

pub const BAND_WALK: &str = "walk";
pub const BAND_FOG: &str = "fog";
pub const BAND_TREMOR: &str = "tremor";
pub const BAND_DYSKINESIA: &str = "dyskinesia";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorChannel {
    Accel,
    Gyro,
}

/// Named frequency interval bound to one sensor channel.
///
/// Edge inclusivity is explicit per side because the classifier thresholds
/// depend on where boundary energy lands: the walking band owns 3.0 Hz, the
/// freeze-candidate band starts just above it and owns its upper edge.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Band {
    pub channel: SensorChannel,
    pub name: String,
    pub low_hz: f32,
    pub high_hz: f32,
    #[serde(default = "edge_inclusive")]
    pub low_inclusive: bool,
    #[serde(default = "edge_inclusive")]
    pub high_inclusive: bool,
}

fn edge_inclusive() -> bool {
    true
}

impl Band {
    pub fn contains(&self, freq_hz: f32) -> bool {
        let above = if self.low_inclusive {
            freq_hz >= self.low_hz
        } else {
            freq_hz > self.low_hz
        };
        let below = if self.high_inclusive {
            freq_hz <= self.high_hz
        } else {
            freq_hz < self.high_hz
        };
        above && below
    }
}

/// Sum of spectrum magnitudes whose bin frequency falls inside the band.
/// Bin 0 (DC) is never counted. Pure over its inputs.
pub fn band_power(spectrum: &MagnitudeSpectrum, band: &Band) -> f32 {
    spectrum
        .magnitudes()
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(k, _)| band.contains(spectrum.bin_hz(*k)))
        .map(|(_, &m)| m)
        .sum()
}

/// Strongest non-DC bin converted to Hz, if it clears the noise floor.
pub fn dominant_frequency(spectrum: &MagnitudeSpectrum, noise_floor: f32) -> Option<f32> {
    let mut max_val = 0.0f32;
    let mut max_bin = 0usize;
    for (k, &m) in spectrum.magnitudes().iter().enumerate().skip(1) {
        if m > max_val {
            max_val = m;
            max_bin = k;
        }
    }
    (max_val > noise_floor).then(|| spectrum.bin_hz(max_bin))
}
