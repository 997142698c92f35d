use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Addressing errors
    #[error("Invalid bus address: {0:#04x} (7-bit addresses are 0x00-0x7F)")]
    InvalidAddress(u64),

    #[error("Invalid state id: {0}")]
    InvalidStateId(String),

    #[error("Invalid pin {pin} on {address} ({count} pins available)")]
    InvalidPin {
        address: String,
        pin: usize,
        count: usize,
    },

    // Configuration errors
    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate bus address: {0}")]
    DuplicateAddress(String),

    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
