//! Longitudinal Redundancy Check (LRC) calculation for ASCII framing

use modbus_core::{ModbusError, ModbusResult};

/// Longitudinal Redundancy Check calculator
///
/// The LRC is the two's complement of the 8-bit sum of the message bytes, so
/// summing a message together with its LRC yields zero.
#[derive(Debug, Clone, Default)]
pub struct LrcCalc {
    sum: u8,
}

impl LrcCalc {
    /// Create a new LRC calculator
    pub fn new() -> Self {
        Self { sum: 0 }
    }

    /// Reset to the initial state
    pub fn reset(&mut self) {
        self.sum = 0;
    }

    /// Update the running sum with a single byte
    pub fn update(&mut self, data: u8) {
        self.sum = self.sum.wrapping_add(data);
    }

    /// Update the running sum with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// LRC byte for the data seen so far
    pub fn value(&self) -> u8 {
        self.sum.wrapping_neg()
    }

    /// Validate a message that includes its trailing LRC byte
    pub fn validate(&self) -> ModbusResult<()> {
        if self.sum != 0 {
            Err(ModbusError::MalformedFrame(format!(
                "LRC mismatch: residue 0x{:02X}",
                self.sum
            )))
        } else {
            Ok(())
        }
    }

    /// LRC of a complete message
    pub fn compute(data: &[u8]) -> u8 {
        let mut calc = Self::new();
        calc.update_bytes(data);
        calc.value()
    }
}
