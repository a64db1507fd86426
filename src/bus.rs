use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("bridge returned {actual:#04x} instead of ACK for {op} of register {reg:#04x}")]
    Nack {
        op: &'static str,
        reg: u8,
        actual: u8,
    },
    #[error("device identity mismatch: expected {expected:#04x}, got {actual:#04x}")]
    BadIdentity { expected: u8, actual: u8 },
    #[error("injected bus fault on register {reg:#04x}")]
    Injected { reg: u8 },
}

/// Register-addressed two-wire bus, as seen by a sensor driver.
///
/// Axis values are 16-bit little-endian two's-complement words split across
/// two consecutive registers, so a combined read is provided here.
pub trait RegisterBus {
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), BusError>;
    fn read_reg(&mut self, reg: u8) -> Result<u8, BusError>;

    fn read_i16_le(&mut self, low_reg: u8) -> Result<i16, BusError> {
        let lo = self.read_reg(low_reg)?;
        let hi = self.read_reg(low_reg + 1)?;
        Ok(i16::from_le_bytes([lo, hi]))
    }
}

const OP_WRITE: u8 = b'W';
const OP_READ: u8 = b'R';
const ACK: u8 = 0x06;

/// Serial adapter carrying the register protocol to the sensor board.
///
/// Frame format: `['W', reg, value]` answered by one ACK byte, and
/// `['R', reg]` answered by `[ACK, value]`.
pub struct SerialBridge {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialBridge {
    pub fn open(path: &str, baud: u32) -> anyhow::Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("failed to open sensor bridge on {path}"))?;
        Ok(Self { port })
    }
}

impl RegisterBus for SerialBridge {
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.port.write_all(&[OP_WRITE, reg, value])?;
        self.port.flush()?;
        let mut reply = [0u8; 1];
        self.port.read_exact(&mut reply)?;
        if reply[0] != ACK {
            return Err(BusError::Nack {
                op: "write",
                reg,
                actual: reply[0],
            });
        }
        Ok(())
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, BusError> {
        self.port.write_all(&[OP_READ, reg])?;
        self.port.flush()?;
        let mut reply = [0u8; 2];
        self.port.read_exact(&mut reply)?;
        if reply[0] != ACK {
            return Err(BusError::Nack {
                op: "read",
                reg,
                actual: reply[0],
            });
        }
        Ok(reply[1])
    }
}

/// In-memory register map useful for tests and bench rigs without hardware.
#[derive(Default)]
pub struct FakeBus {
    regs: HashMap<u8, u8>,
    writes: Vec<(u8, u8)>,
    failing: bool,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register value.
    pub fn set_reg(&mut self, reg: u8, value: u8) {
        self.regs.insert(reg, value);
    }

    /// Preload a 16-bit little-endian axis value across two registers.
    pub fn set_axis(&mut self, low_reg: u8, value: i16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.insert(low_reg, lo);
        self.regs.insert(low_reg + 1, hi);
    }

    /// Make every subsequent read fail until cleared.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// All writes observed so far, in order.
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }
}

impl RegisterBus for FakeBus {
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.regs.insert(reg, value);
        self.writes.push((reg, value));
        Ok(())
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, BusError> {
        if self.failing {
            return Err(BusError::Injected { reg });
        }
        Ok(*self.regs.get(&reg).unwrap_or(&0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_bus_round_trips_registers() {
        let mut bus = FakeBus::new();
        bus.write_reg(0x10, 0x4C).unwrap();
        assert_eq!(bus.read_reg(0x10).unwrap(), 0x4C);
        assert_eq!(bus.writes(), &[(0x10, 0x4C)]);
    }

    #[test]
    fn fake_bus_assembles_negative_axis_words() {
        let mut bus = FakeBus::new();
        bus.set_axis(0x28, -16384);
        assert_eq!(bus.read_i16_le(0x28).unwrap(), -16384);
    }

    #[test]
    fn injected_faults_surface_as_errors() {
        let mut bus = FakeBus::new();
        bus.set_failing(true);
        assert!(matches!(
            bus.read_reg(0x0F),
            Err(BusError::Injected { reg: 0x0F })
        ));
    }
}
