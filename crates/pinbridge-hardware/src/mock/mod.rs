//! Mock bus implementation for testing and development.
//!
//! This module provides a simulated bus that can be scripted and inspected
//! programmatically without requiring physical hardware.

pub mod bus;

// Re-export commonly used types
pub use bus::{BusOp, MockBus, MockBusHandle, MockBusOpener};
