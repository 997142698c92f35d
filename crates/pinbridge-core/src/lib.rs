//! Shared building blocks for the pinbridge bus adapter.
//!
//! This crate holds the pieces every other crate agrees on: validated bus
//! addresses, hierarchical state ids, state values, the configuration records
//! produced by the administrative side, and the hex formatting used for
//! naming and diagnostics.

pub mod config;
pub mod constants;
pub mod error;
pub mod hex;
pub mod types;

pub use config::{AdapterConfig, DeviceConfig, PinConfig, PinDirection};
pub use error::{Error, Result};
pub use hex::to_hex_string;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
