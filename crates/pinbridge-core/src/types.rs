use crate::{
    Result,
    constants::{MAX_BUS_ADDRESS, STATE_ID_SEPARATOR},
    error::Error,
    hex::{DEFAULT_HEX_WIDTH, to_hex_string},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 7-bit bus address of a peripheral.
///
/// Displayed in the canonical `0xNN` form used for state ids and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BusAddress(u8);

impl BusAddress {
    /// Create a new bus address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidAddress` if the value does not fit in 7 bits.
    pub fn new(raw: u8) -> Result<Self> {
        if raw > MAX_BUS_ADDRESS {
            return Err(Error::InvalidAddress(u64::from(raw)));
        }
        Ok(BusAddress(raw))
    }

    /// Get the raw address as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Format the address as `0xNN`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        to_hex_string(u32::from(self.0), DEFAULT_HEX_WIDTH)
    }
}

impl TryFrom<u8> for BusAddress {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        BusAddress::new(raw)
    }
}

impl From<BusAddress> for u8 {
    fn from(address: BusAddress) -> Self {
        address.0
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for BusAddress {
    type Err = Error;

    /// Accepts `0x20`, `0X20` and plain decimal `32`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => s.parse(),
        };
        let raw = parsed.map_err(|_| Error::Config(format!("Invalid bus address: {s}")))?;
        BusAddress::new(raw)
    }
}

/// Hierarchical name of one state point, relative to the adapter namespace.
///
/// Device ids are the device's hex address (`0x20`); pin and register ids
/// append one segment (`0x20.3`, `0x48.conversion`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateId(String);

impl StateId {
    /// Create a state id from a dotted string.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateId` if the id is empty or has an empty
    /// segment (leading, trailing or doubled separator).
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.split(STATE_ID_SEPARATOR).any(str::is_empty) {
            return Err(Error::InvalidStateId(id));
        }
        Ok(StateId(id))
    }

    /// Id of the device object itself.
    #[must_use]
    pub fn device(address: BusAddress) -> Self {
        StateId(address.to_hex())
    }

    /// Id of one pin of a device.
    #[must_use]
    pub fn pin(address: BusAddress, index: usize) -> Self {
        StateId(format!("{}{STATE_ID_SEPARATOR}{index}", address.to_hex()))
    }

    /// Id of a named register point of a device.
    #[must_use]
    pub fn register(address: BusAddress, name: &str) -> Self {
        StateId(format!("{}{STATE_ID_SEPARATOR}{name}", address.to_hex()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified id as seen by the state store.
    #[must_use]
    pub fn qualified(&self, namespace: &str) -> String {
        if namespace.is_empty() {
            return self.0.clone();
        }
        format!("{namespace}{STATE_ID_SEPARATOR}{}", self.0)
    }

    /// Recover a relative id from a fully qualified one.
    ///
    /// Returns `None` when `full` does not live under `namespace`.
    #[must_use]
    pub fn from_qualified(full: &str, namespace: &str) -> Option<Self> {
        let rest = if namespace.is_empty() {
            full
        } else {
            full.strip_prefix(namespace)?
                .strip_prefix(STATE_ID_SEPARATOR)?
        };
        StateId::new(rest).ok()
    }
}

impl TryFrom<String> for StateId {
    type Error = Error;

    fn try_from(id: String) -> Result<Self> {
        StateId::new(id)
    }
}

impl From<StateId> for String {
    fn from(id: StateId) -> Self {
        id.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a state point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
}

impl StateValue {
    /// Interpret the value as a logic level; non-zero numbers are `true`.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
        }
    }

    /// Interpret the value as a number; booleans map to 0 and 1.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u16> for StateValue {
    fn from(value: u16) -> Self {
        Self::Number(f64::from(value))
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}
