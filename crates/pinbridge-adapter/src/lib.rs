//! Device handler framework and adapter runtime.
//!
//! This crate maps I/O expanders on a shared bus onto addressable state
//! points of a host state store. It reconciles three triggers of bus traffic
//! (periodic polling, interrupt notifications and write requests) into one
//! serialized access discipline.
//!
//! # Layers
//!
//! - [`store`]: the contract required from the host's state store.
//! - [`sync`]: acknowledged-value cache, listener tables and change routing.
//! - [`handler`]: the per-device state machine shared by all chip families.
//! - [`devices`]: PCF8574 and MCP23017 handlers, the big-endian word base
//!   and the family registry.
//! - [`manager`]: builds, starts, stops and dispatches to handlers.
//! - [`adapter`]: the single-task event loop and its handle.
//!
//! # Example
//!
//! ```
//! use pinbridge_adapter::adapter::Adapter;
//! use pinbridge_adapter::mock::MemoryStore;
//! use pinbridge_adapter::store::StateChange;
//! use pinbridge_core::AdapterConfig;
//! use pinbridge_hardware::mock::{MockBus, MockBusOpener};
//!
//! #[tokio::main]
//! async fn main() -> pinbridge_adapter::Result<()> {
//!     let config = AdapterConfig::from_json(
//!         r#"{"busNumber": 1, "devices": [{"address": 32, "type": "PCF8574"}]}"#,
//!     )?;
//!     let (_bus, bus_handle) = MockBus::new();
//!     let (store, _store_handle) = MemoryStore::new();
//!
//!     let opener = MockBusOpener::new().with_bus(1, bus_handle);
//!     let (adapter, handle) = Adapter::new(config, Box::new(store), opener)?;
//!     let runtime = tokio::spawn(adapter.run());
//!
//!     handle
//!         .notify_state_change(StateChange::command("i2c.0.0x20.0", true))
//!         .await?;
//!     handle.shutdown().await?;
//!     runtime.await.ok();
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod admin;
pub mod devices;
pub mod error;
pub mod handler;
pub mod manager;
pub mod mock;
pub mod store;
pub mod sync;
pub mod timer;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use adapter::{Adapter, AdapterEvent, AdapterHandle};
pub use admin::{AdminCommand, AdminResponse};
pub use devices::{AnyDeviceHandler, DeviceRegistry, Mcp23017, Pcf8574};
pub use error::{AdapterError, Result};
pub use handler::{DeviceHandler, HandlerBase, HandlerContext, Lifecycle};
pub use manager::DeviceManager;
pub use store::{StateChange, StateStore};
pub use sync::StateSync;
