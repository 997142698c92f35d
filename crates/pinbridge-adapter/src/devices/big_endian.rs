//! Base for chips that expose 16-bit registers most significant byte first.
//!
//! SMBus word transfers put the low byte on the wire first. Chips such as
//! the MCP23017 in paired-register mode send the high byte first, so every
//! word crossing the transport is byte-swapped here.

use pinbridge_core::BusAddress;
use pinbridge_hardware::{BusTransport, Result};
use tracing::trace;

/// Swap the two bytes of a word.
#[inline]
pub fn swap_word(value: u16) -> u16 {
    value.swap_bytes()
}

/// Register access for a big-endian word device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigEndianRegisters {
    address: BusAddress,
}

impl BigEndianRegisters {
    pub fn new(address: BusAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> BusAddress {
        self.address
    }

    /// Read a register pair and return it with the first byte on the wire
    /// in the high half.
    pub fn read_word<B: BusTransport + ?Sized>(&self, bus: &mut B, command: u8) -> Result<u16> {
        let value = swap_word(bus.read_word(self.address, command)?);
        trace!(address = %self.address, command, value, "Read word");
        Ok(value)
    }

    /// Write a register pair, high half first on the wire.
    pub fn write_word<B: BusTransport + ?Sized>(&self, bus: &mut B, command: u8, value: u16) -> Result<()> {
        trace!(address = %self.address, command, value, "Write word");
        bus.write_word(self.address, command, swap_word(value))
    }
}
