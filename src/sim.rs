use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::monitor::acquisition::{AxisSample, MotionSample, SampleSource};
use crate::monitor::error::MonitorError;

const WALK_HZ: f32 = 2.0;
const FOG_HZ: f32 = 5.0;
const TREMOR_HZ: f32 = 4.0;
const DYSK_HZ: f32 = 6.0;

/// Amplitudes of the synthetic movement components, in g (accel) and dps
/// (gyro).
///
/// The oscillations ride on a same-axis bias (gravity for accel, `gyro_bias`
/// for gyro) larger than their summed amplitudes, so the L2 magnitude the
/// pipeline consumes keeps the fundamental instead of rectifying it.
#[derive(Clone, Copy, Debug)]
pub struct SimProfile {
    pub walk_amp: f32,
    pub fog_amp: f32,
    pub tremor_amp: f32,
    pub dysk_amp: f32,
    pub gyro_bias: f32,
    pub accel_noise: f32,
    pub gyro_noise: f32,
}

impl SimProfile {
    pub fn walking() -> Self {
        Self {
            walk_amp: 0.3,
            fog_amp: 0.0,
            tremor_amp: 0.0,
            dysk_amp: 0.0,
            gyro_bias: 0.0,
            accel_noise: 0.02,
            gyro_noise: 0.5,
        }
    }

    pub fn tremor() -> Self {
        Self {
            walk_amp: 0.0,
            fog_amp: 0.0,
            tremor_amp: 40.0,
            dysk_amp: 0.0,
            gyro_bias: 60.0,
            accel_noise: 0.02,
            gyro_noise: 0.5,
        }
    }

    pub fn dyskinesia() -> Self {
        Self {
            walk_amp: 0.0,
            fog_amp: 0.0,
            tremor_amp: 0.0,
            dysk_amp: 40.0,
            gyro_bias: 60.0,
            accel_noise: 0.02,
            gyro_noise: 0.5,
        }
    }

    pub fn freezing() -> Self {
        Self {
            walk_amp: 0.0,
            fog_amp: 0.12,
            tremor_amp: 0.0,
            dysk_amp: 0.0,
            gyro_bias: 0.0,
            accel_noise: 0.01,
            gyro_noise: 0.2,
        }
    }
}

/// Named simulation profile selectable from the config file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimProfileKind {
    #[default]
    Walking,
    Tremor,
    Dyskinesia,
    Freezing,
}

impl SimProfileKind {
    pub fn profile(self) -> SimProfile {
        match self {
            SimProfileKind::Walking => SimProfile::walking(),
            SimProfileKind::Tremor => SimProfile::tremor(),
            SimProfileKind::Dyskinesia => SimProfile::dyskinesia(),
            SimProfileKind::Freezing => SimProfile::freezing(),
        }
    }
}

/// Synthetic sensor: gravity plus sinusoidal movement components with a
/// little jitter, so the whole pipeline can run without hardware.
pub struct SimSource {
    rng: StdRng,
    profile: SimProfile,
    sample_rate_hz: f32,
    tick: u64,
}

impl SimSource {
    pub fn new(profile: SimProfile, sample_rate_hz: f32) -> Self {
        Self::seeded(profile, sample_rate_hz, 0x6A)
    }

    pub fn seeded(profile: SimProfile, sample_rate_hz: f32, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
            sample_rate_hz,
            tick: 0,
        }
    }

    fn jitter(&mut self, amp: f32) -> f32 {
        if amp > 0.0 {
            self.rng.gen_range(-amp..amp)
        } else {
            0.0
        }
    }
}

impl SampleSource for SimSource {
    fn read(&mut self) -> Result<MotionSample, MonitorError> {
        let t = self.tick as f32 / self.sample_rate_hz;
        self.tick += 1;
        let p = self.profile;

        // gravity keeps the vertical axis dominant
        let accel_z = 1.0
            + p.walk_amp * (TAU * WALK_HZ * t).sin()
            + p.fog_amp * (TAU * FOG_HZ * t).sin()
            + self.jitter(p.accel_noise);
        let accel = AxisSample {
            x: self.jitter(p.accel_noise),
            y: self.jitter(p.accel_noise),
            z: accel_z,
        };

        let gyro_x = p.gyro_bias
            + p.tremor_amp * (TAU * TREMOR_HZ * t).sin()
            + p.dysk_amp * (TAU * DYSK_HZ * t).sin()
            + self.jitter(p.gyro_noise);
        let gyro = AxisSample {
            x: gyro_x,
            y: self.jitter(p.gyro_noise),
            z: self.jitter(p.gyro_noise),
        };

        Ok(MotionSample { accel, gyro })
    }
}
