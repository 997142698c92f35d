//! Bus transport on top of `embedded-hal` 1.0.
//!
//! Any blocking [`embedded_hal::i2c::I2c`] implementation (a Linux device
//! node driver, a USB bridge, a microcontroller peripheral) becomes a
//! [`BusTransport`] by wrapping it in [`HalBus`]. The SMBus primitives are
//! expressed as plain I2C transfers:
//!
//! | Primitive | Wire transfer |
//! |---|---|
//! | send byte | write `[value]` |
//! | receive byte | read 1 byte |
//! | read word | write `[cmd]`, repeated start, read 2 bytes (low byte first) |
//! | write word | write `[cmd, lo, hi]` |
//! | block read/write | same, with `n` data bytes |

use crate::{
    BusError, Result,
    traits::{BusTransport, check_block_len},
};
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use pinbridge_core::{
    BusAddress,
    constants::{SCAN_FIRST_ADDRESS, SCAN_LAST_ADDRESS},
};
use tracing::trace;

/// Map an `embedded-hal` error onto the transport error taxonomy.
fn map_error<E: embedded_hal::i2c::Error>(address: BusAddress, error: E) -> BusError {
    match error.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::nack(address),
        ErrorKind::ArbitrationLoss => BusError::ArbitrationLost,
        kind => BusError::communication(format!("{kind} at {address}")),
    }
}

/// [`BusTransport`] backed by an `embedded-hal` I2C driver.
///
/// # Examples
///
/// ```ignore
/// use linux_embedded_hal::I2cdev;
/// use pinbridge_hardware::hal::HalBus;
///
/// let bus = HalBus::new(I2cdev::new("/dev/i2c-1")?);
/// ```
#[derive(Debug)]
pub struct HalBus<I> {
    i2c: I,
}

impl<I: I2c> HalBus<I> {
    /// Wrap an I2C driver.
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Get a mutable reference to the wrapped driver.
    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    /// Unwrap the driver.
    pub fn into_inner(self) -> I {
        self.i2c
    }
}

impl<I: I2c> BusTransport for HalBus<I> {
    fn read_byte(&mut self, address: BusAddress) -> Result<u8> {
        let mut buffer = [0u8; 1];
        self.i2c
            .read(address.as_u8(), &mut buffer)
            .map_err(|e| map_error(address, e))?;
        Ok(buffer[0])
    }

    fn write_byte(&mut self, address: BusAddress, value: u8) -> Result<()> {
        self.i2c
            .write(address.as_u8(), &[value])
            .map_err(|e| map_error(address, e))
    }

    fn read_word(&mut self, address: BusAddress, command: u8) -> Result<u16> {
        let mut buffer = [0u8; 2];
        self.i2c
            .write_read(address.as_u8(), &[command], &mut buffer)
            .map_err(|e| map_error(address, e))?;
        Ok(u16::from_le_bytes(buffer))
    }

    fn write_word(&mut self, address: BusAddress, command: u8, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.i2c
            .write(address.as_u8(), &[command, lo, hi])
            .map_err(|e| map_error(address, e))
    }

    fn read_block(
        &mut self,
        address: BusAddress,
        command: u8,
        buffer: &mut [u8],
    ) -> Result<usize> {
        check_block_len(buffer.len())?;
        self.i2c
            .write_read(address.as_u8(), &[command], buffer)
            .map_err(|e| map_error(address, e))?;
        Ok(buffer.len())
    }

    fn write_block(&mut self, address: BusAddress, command: u8, data: &[u8]) -> Result<()> {
        check_block_len(data.len())?;
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(command);
        frame.extend_from_slice(data);
        self.i2c
            .write(address.as_u8(), &frame)
            .map_err(|e| map_error(address, e))
    }

    fn read(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<usize> {
        self.i2c
            .read(address.as_u8(), buffer)
            .map_err(|e| map_error(address, e))?;
        Ok(buffer.len())
    }

    fn write(&mut self, address: BusAddress, data: &[u8]) -> Result<()> {
        self.i2c
            .write(address.as_u8(), data)
            .map_err(|e| map_error(address, e))
    }

    /// Probe every non-reserved address with a one-byte read.
    fn scan(&mut self) -> Result<Vec<BusAddress>> {
        let mut found = Vec::new();
        let mut probe = [0u8; 1];

        for raw in SCAN_FIRST_ADDRESS..=SCAN_LAST_ADDRESS {
            let address = BusAddress::new(raw)?;
            match self.i2c.read(raw, &mut probe) {
                Ok(()) => found.push(address),
                Err(e) if matches!(e.kind(), ErrorKind::NoAcknowledge(_)) => {}
                Err(e) => trace!(address = %address, error = ?e, "Probe failed"),
            }
        }

        trace!(count = found.len(), "Scan complete");
        Ok(found)
    }
}
