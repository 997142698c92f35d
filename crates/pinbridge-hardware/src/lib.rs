//! Bus transport layer for the pinbridge adapter.
//!
//! This crate defines the contract the device handlers require from a shared
//! two-wire bus, together with two implementations: [`hal::HalBus`], which
//! adapts any `embedded-hal` 1.0 I2C driver, and [`mock::MockBus`], a
//! scriptable in-memory bus for development and testing.
//!
//! # Transport Contract
//!
//! The [`BusTransport`] trait exposes the SMBus-style primitives used by the
//! handlers (byte, word and block transfers), plain transfers and a bus scan
//! used by the administrative commands:
//!
//! ```
//! use pinbridge_core::BusAddress;
//! use pinbridge_hardware::{BusTransport, Result};
//!
//! fn toggle_all<B: BusTransport + ?Sized>(bus: &mut B, address: BusAddress) -> Result<u8> {
//!     let current = bus.read_byte(address)?;
//!     bus.write_byte(address, !current)?;
//!     Ok(!current)
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a [`BusError`].
//! A failed transfer is a value, never a panic; callers decide what a failure
//! means for them.
//!
//! # Mock Implementations
//!
//! [`mock::MockBus`] records every transaction and serves scripted responses,
//! which is what the handler tests use to check write-before-read ordering,
//! debounce and glitch retries.

#[cfg(feature = "embedded-hal")]
pub mod hal;

pub mod error;
pub mod mock;
pub mod traits;

// Re-export commonly used types for convenience
pub use error::{BusError, Result};
pub use traits::{BoxedTransport, BusOpener, BusTransport, MAX_BLOCK_LEN};

#[cfg(feature = "embedded-hal")]
pub use hal::HalBus;
