//! Error types for bus transport operations.
//!
//! Every transport primitive reports failure as a [`BusError`] value; callers
//! decide whether a failure is fatal. Device handlers never treat one as
//! fatal, they log it and keep their previous state.

use pinbridge_core::BusAddress;

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus transport operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Addressed device did not acknowledge.
    #[error("No acknowledgment from device at {address}")]
    Nack { address: BusAddress },

    /// Another master won arbitration.
    #[error("Bus arbitration lost")]
    ArbitrationLost,

    /// The requested bus could not be opened.
    #[error("Bus {bus} is not available")]
    NoSuchBus { bus: u32 },

    /// The transport handle has already been closed.
    #[error("Bus is closed")]
    Closed,

    /// Generic communication failure reported by the transport.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Request or response does not fit the transfer.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Operation is not supported by this transport.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Address or id validation failed.
    #[error(transparent)]
    Core(#[from] pinbridge_core::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Create a new not-acknowledged error.
    pub fn nack(address: BusAddress) -> Self {
        Self::Nack { address }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}
