//! Bus transport contract.
//!
//! This module defines the primitives the device handlers and the
//! administrative commands require from a two-wire bus. Implementations wrap
//! an OS device node, an `embedded-hal` driver, or the in-memory
//! [`MockBus`](crate::mock::MockBus).
//!
//! # Synchronous by contract
//!
//! All primitives block until the transaction completes. Real transactions
//! are sub-millisecond, and the adapter runs every handler from one task, so
//! a blocking call can never interleave with another bus transaction.
//!
//! # Object Safety
//!
//! Unlike async-first device traits, [`BusTransport`] has no `async fn`
//! methods and is object-safe: the adapter stores the open bus as a
//! [`BoxedTransport`].

use crate::error::Result;
use pinbridge_core::BusAddress;

/// Largest block accepted by SMBus block transfers.
pub const MAX_BLOCK_LEN: usize = 32;

/// Two-wire bus transport.
///
/// Word values are exchanged in host byte order exactly as the transport
/// delivers them (SMBus: low byte first on the wire). Chips with big-endian
/// registers correct for this above the transport.
///
/// # Examples
///
/// ```
/// use pinbridge_core::BusAddress;
/// use pinbridge_hardware::mock::MockBus;
/// use pinbridge_hardware::traits::BusTransport;
///
/// let (mut bus, handle) = MockBus::new();
/// let expander = BusAddress::new(0x20).unwrap();
///
/// handle.queue_byte_reads(expander, [0xF0]);
/// bus.write_byte(expander, 0xFF).unwrap();
/// assert_eq!(bus.read_byte(expander).unwrap(), 0xF0);
/// ```
pub trait BusTransport {
    /// Receive a single byte (SMBus receive byte).
    fn read_byte(&mut self, address: BusAddress) -> Result<u8>;

    /// Send a single byte (SMBus send byte).
    fn write_byte(&mut self, address: BusAddress, value: u8) -> Result<()>;

    /// Read a 16-bit word from register `command` (SMBus read word data).
    fn read_word(&mut self, address: BusAddress, command: u8) -> Result<u16>;

    /// Write a 16-bit word to register `command` (SMBus write word data).
    fn write_word(&mut self, address: BusAddress, command: u8, value: u16) -> Result<()>;

    /// Read `buffer.len()` bytes starting at register `command`.
    ///
    /// Returns the number of bytes read.
    fn read_block(&mut self, address: BusAddress, command: u8, buffer: &mut [u8])
    -> Result<usize>;

    /// Write `data` starting at register `command`.
    fn write_block(&mut self, address: BusAddress, command: u8, data: &[u8]) -> Result<()>;

    /// Plain read without a register byte.
    ///
    /// Returns the number of bytes read.
    fn read(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<usize>;

    /// Plain write without a register byte.
    fn write(&mut self, address: BusAddress, data: &[u8]) -> Result<()>;

    /// List the addresses that respond on this bus.
    fn scan(&mut self) -> Result<Vec<BusAddress>>;

    /// Release the transport handle.
    ///
    /// The default implementation does nothing; handles that own an OS
    /// resource release it here or on drop.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn read_byte(&mut self, address: BusAddress) -> Result<u8> {
        (**self).read_byte(address)
    }

    fn write_byte(&mut self, address: BusAddress, value: u8) -> Result<()> {
        (**self).write_byte(address, value)
    }

    fn read_word(&mut self, address: BusAddress, command: u8) -> Result<u16> {
        (**self).read_word(address, command)
    }

    fn write_word(&mut self, address: BusAddress, command: u8, value: u16) -> Result<()> {
        (**self).write_word(address, command, value)
    }

    fn read_block(
        &mut self,
        address: BusAddress,
        command: u8,
        buffer: &mut [u8],
    ) -> Result<usize> {
        (**self).read_block(address, command, buffer)
    }

    fn write_block(&mut self, address: BusAddress, command: u8, data: &[u8]) -> Result<()> {
        (**self).write_block(address, command, data)
    }

    fn read(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<usize> {
        (**self).read(address, buffer)
    }

    fn write(&mut self, address: BusAddress, data: &[u8]) -> Result<()> {
        (**self).write(address, data)
    }

    fn scan(&mut self) -> Result<Vec<BusAddress>> {
        (**self).scan()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Owned, sendable transport handle.
pub type BoxedTransport = Box<dyn BusTransport + Send>;

/// Opens a bus by number.
///
/// Used once at startup for the main bus and on demand by the search command
/// for a secondary bus. Closures of the right shape implement this trait:
///
/// ```
/// use pinbridge_hardware::traits::{BoxedTransport, BusOpener};
/// use pinbridge_hardware::mock::MockBus;
/// use pinbridge_hardware::Result;
///
/// let opener = |_bus: u32| -> Result<BoxedTransport> { Ok(Box::new(MockBus::new().0)) };
/// assert!(opener.open(1).is_ok());
/// ```
pub trait BusOpener {
    /// Open bus `bus_number`.
    fn open(&self, bus_number: u32) -> Result<BoxedTransport>;
}

impl<F> BusOpener for F
where
    F: Fn(u32) -> Result<BoxedTransport>,
{
    fn open(&self, bus_number: u32) -> Result<BoxedTransport> {
        self(bus_number)
    }
}

/// Check a block transfer length against [`MAX_BLOCK_LEN`].
pub(crate) fn check_block_len(len: usize) -> Result<()> {
    if len == 0 || len > MAX_BLOCK_LEN {
        return Err(crate::BusError::invalid_data(format!(
            "Block length must be 1-{MAX_BLOCK_LEN}, got {len}"
        )));
    }
    Ok(())
}
