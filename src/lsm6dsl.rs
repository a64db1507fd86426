use std::thread;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::bus::{BusError, RegisterBus};
use crate::monitor::acquisition::{AxisSample, MotionSample, SampleSource};
use crate::monitor::error::MonitorError;

// LSM6DSL register map (the subset this monitor touches)
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL1_XL: u8 = 0x10;
const REG_CTRL2_G: u8 = 0x11;
const REG_CTRL3_C: u8 = 0x12;
const REG_OUTX_L_G: u8 = 0x22;
const REG_OUTX_L_XL: u8 = 0x28;

/// Expected WHO_AM_I value for the LSM6DSL.
pub const WHO_AM_I_VALUE: u8 = 0x6A;

/// Block data update + register address auto-increment.
const CTRL3_BDU_IF_INC: u8 = 0x44;

const IDENTITY_RETRIES: u32 = 3;
const IDENTITY_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Accelerometer output data rates this monitor runs at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputDataRate {
    Hz52,
    Hz104,
}

impl OutputDataRate {
    pub fn from_hz(hz: f32) -> Option<Self> {
        if (hz - 52.0).abs() < 0.5 {
            Some(OutputDataRate::Hz52)
        } else if (hz - 104.0).abs() < 0.5 {
            Some(OutputDataRate::Hz104)
        } else {
            None
        }
    }

    pub fn hz(self) -> f32 {
        match self {
            OutputDataRate::Hz52 => 52.0,
            OutputDataRate::Hz104 => 104.0,
        }
    }

    fn bits(self) -> u8 {
        match self {
            OutputDataRate::Hz52 => 0b0011,
            OutputDataRate::Hz104 => 0b0100,
        }
    }
}

/// Accelerometer full-scale range, which fixes the raw-to-g conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelScale {
    G2,
    G8,
}

impl AccelScale {
    pub fn g_per_lsb(self) -> f32 {
        match self {
            AccelScale::G2 => 0.000_061,
            AccelScale::G8 => 0.000_244,
        }
    }

    fn bits(self) -> u8 {
        match self {
            AccelScale::G2 => 0b00,
            AccelScale::G8 => 0b11,
        }
    }
}

/// Gyroscope raw-to-dps conversion at the ±250 dps full-scale range.
pub const GYRO_DPS_PER_LSB_250: f32 = 0.008_75;

#[derive(Clone, Copy, Debug)]
pub struct SensorConfig {
    pub odr: OutputDataRate,
    pub accel_scale: AccelScale,
    pub gyro_dps_per_lsb: f32,
    pub enable_gyro: bool,
}

/// LSM6DSL inertial sensor over any register bus.
pub struct Lsm6dsl<B: RegisterBus> {
    bus: B,
    accel_g_per_lsb: f32,
    gyro_dps_per_lsb: f32,
    gyro_enabled: bool,
}

impl<B: RegisterBus> Lsm6dsl<B> {
    /// Probe the device identity and configure output data rate, full-scale
    /// range and channel enables.
    ///
    /// The identity check retries a few times before giving up; a failure
    /// here is fatal for the monitor.
    pub fn init(mut bus: B, cfg: &SensorConfig) -> Result<Self, BusError> {
        let mut result = Self::probe_identity(&mut bus);
        for attempt in 1..IDENTITY_RETRIES {
            if result.is_ok() {
                break;
            }
            warn!("sensor identity probe failed (attempt {attempt}), retrying");
            thread::sleep(IDENTITY_RETRY_DELAY);
            result = Self::probe_identity(&mut bus);
        }
        result?;

        bus.write_reg(REG_CTRL3_C, CTRL3_BDU_IF_INC)?;
        bus.write_reg(
            REG_CTRL1_XL,
            (cfg.odr.bits() << 4) | (cfg.accel_scale.bits() << 2),
        )?;
        // gyro powered down entirely when unused
        let ctrl2 = if cfg.enable_gyro {
            cfg.odr.bits() << 4
        } else {
            0x00
        };
        bus.write_reg(REG_CTRL2_G, ctrl2)?;
        info!(
            "LSM6DSL configured: {} Hz, accel {:?}, gyro {}",
            cfg.odr.hz(),
            cfg.accel_scale,
            if cfg.enable_gyro { "on" } else { "off" }
        );
        Ok(Self {
            bus,
            accel_g_per_lsb: cfg.accel_scale.g_per_lsb(),
            gyro_dps_per_lsb: cfg.gyro_dps_per_lsb,
            gyro_enabled: cfg.enable_gyro,
        })
    }

    fn probe_identity(bus: &mut B) -> Result<(), BusError> {
        let who = bus.read_reg(REG_WHO_AM_I)?;
        if who == WHO_AM_I_VALUE {
            Ok(())
        } else {
            Err(BusError::BadIdentity {
                expected: WHO_AM_I_VALUE,
                actual: who,
            })
        }
    }

    fn read_vector(&mut self, base: u8, scale: f32) -> Result<AxisSample, BusError> {
        let x = self.bus.read_i16_le(base)? as f32 * scale;
        let y = self.bus.read_i16_le(base + 2)? as f32 * scale;
        let z = self.bus.read_i16_le(base + 4)? as f32 * scale;
        Ok(AxisSample { x, y, z })
    }

    pub fn read_accel(&mut self) -> Result<AxisSample, BusError> {
        self.read_vector(REG_OUTX_L_XL, self.accel_g_per_lsb)
    }

    pub fn read_gyro(&mut self) -> Result<AxisSample, BusError> {
        if !self.gyro_enabled {
            return Ok(AxisSample::default());
        }
        self.read_vector(REG_OUTX_L_G, self.gyro_dps_per_lsb)
    }

    pub fn read_motion(&mut self) -> Result<MotionSample, BusError> {
        Ok(MotionSample {
            accel: self.read_accel()?,
            gyro: self.read_gyro()?,
        })
    }
}

impl<B: RegisterBus> SampleSource for Lsm6dsl<B> {
    fn read(&mut self) -> Result<MotionSample, MonitorError> {
        self.read_motion().map_err(MonitorError::from)
    }
}
