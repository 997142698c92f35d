//! Error types for the adapter runtime.
//!
//! Transport failures inside a device handler are logged and swallowed at
//! device scope; the variants here are what crosses a handler or adapter
//! boundary: store failures, lifecycle violations, routing defects and
//! startup problems.

use crate::handler::Lifecycle;
use crate::store::StoreError;
use pinbridge_core::BusAddress;
use pinbridge_hardware::BusError;

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors that can occur in the adapter runtime.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Bus transport failure that could not be contained at device scope.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Address, id or configuration validation failed.
    #[error(transparent)]
    Core(#[from] pinbridge_core::Error),

    /// The state store rejected or could not serve a request.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// A change notification arrived for an id nobody listens to.
    #[error("Unsupported state change: {0}")]
    UnsupportedStateChange(String),

    /// A handler was asked to make a transition its state machine forbids.
    #[error("Invalid lifecycle transition for {address}: {from} -> {to}")]
    InvalidLifecycle {
        address: BusAddress,
        from: Lifecycle,
        to: Lifecycle,
    },

    /// No handler is configured at this address.
    #[error("No device handler at {0}")]
    UnknownDevice(BusAddress),

    /// Pin index outside the device or not usable for the request.
    #[error("Invalid pin {pin} on {address}: {reason}")]
    InvalidPin {
        address: BusAddress,
        pin: usize,
        reason: String,
    },

    /// Object metadata could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The adapter event loop is gone.
    #[error("Adapter event channel closed")]
    ChannelClosed,
}

impl AdapterError {
    /// Create a new invalid pin error.
    pub fn invalid_pin(address: BusAddress, pin: usize, reason: impl Into<String>) -> Self {
        Self::InvalidPin {
            address,
            pin,
            reason: reason.into(),
        }
    }
}
