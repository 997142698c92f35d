//! Administrative commands.
//!
//! Diagnostic requests from configuration tooling. They bypass the device
//! handlers and talk to a bus transport directly: scan a bus for responding
//! addresses, or issue a raw read or write.

use crate::error::Result;
use pinbridge_core::BusAddress;
use pinbridge_hardware::{BusError, BusOpener, BusTransport, MAX_BLOCK_LEN};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

fn one() -> usize {
    1
}

/// Request from configuration tooling.
///
/// Serialized as `{"command": "...", "message": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "message", rename_all = "lowercase")]
pub enum AdminCommand {
    /// List responding addresses on a bus.
    Search { bus: u32 },

    /// Read `bytes` bytes, from `register` if given.
    Read {
        address: u8,
        #[serde(default)]
        register: Option<u8>,
        #[serde(default = "one")]
        bytes: usize,
    },

    /// Write `data`, to `register` if given.
    Write {
        address: u8,
        #[serde(default)]
        register: Option<u8>,
        data: Vec<u8>,
    },
}

/// Reply to an [`AdminCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AdminResponse {
    /// Addresses found by a search.
    Addresses(Vec<BusAddress>),

    /// Bytes read, or bytes written.
    Data(Vec<u8>),
}

/// Bus access for admin commands.
pub struct AdminContext<'a> {
    /// Running bus.
    pub bus: &'a mut dyn BusTransport,

    /// Number of the running bus.
    pub bus_number: u32,

    /// Opens other buses for searches.
    pub opener: &'a dyn BusOpener,
}

/// Execute one admin command.
///
/// # Errors
/// Returns the bus error of a failed transfer, or an invalid address.
pub fn execute(command: &AdminCommand, ctx: &mut AdminContext<'_>) -> Result<AdminResponse> {
    match command {
        AdminCommand::Search { bus } => search(*bus, ctx),
        AdminCommand::Read {
            address,
            register,
            bytes,
        } => {
            let address = BusAddress::new(*address)?;
            let len = (*bytes).max(1);
            if len > MAX_BLOCK_LEN {
                warn!(%address, bytes = len, "Read length too large");
                return Err(BusError::invalid_data(format!(
                    "Read length must be 1-{MAX_BLOCK_LEN}, got {len}"
                ))
                .into());
            }
            let mut buffer = vec![0u8; len];
            let result = match register {
                Some(register) => ctx.bus.read_block(address, *register, &mut buffer),
                None => ctx.bus.read(address, &mut buffer),
            };
            match result {
                Ok(len) => {
                    buffer.truncate(len);
                    Ok(AdminResponse::Data(buffer))
                }
                Err(e) => {
                    error!(%address, error = %e, "Error reading");
                    Err(e.into())
                }
            }
        }
        AdminCommand::Write {
            address,
            register,
            data,
        } => {
            let address = BusAddress::new(*address)?;
            let result = match register {
                Some(register) => ctx.bus.write_block(address, *register, data),
                None => ctx.bus.write(address, data),
            };
            match result {
                Ok(()) => Ok(AdminResponse::Data(data.clone())),
                Err(e) => {
                    error!(%address, error = %e, "Error writing");
                    Err(e.into())
                }
            }
        }
    }
}

fn search(bus: u32, ctx: &mut AdminContext<'_>) -> Result<AdminResponse> {
    let result = if bus == ctx.bus_number {
        debug!(bus, "Searching on current bus");
        ctx.bus.scan()
    } else {
        debug!(bus, "Searching on new bus");
        scan_secondary(bus, ctx.opener)
    };

    match result {
        Ok(found) => {
            let listing: Vec<String> = found.iter().map(BusAddress::to_hex).collect();
            info!(bus, found = ?listing, "Search found");
            Ok(AdminResponse::Addresses(found))
        }
        Err(e) => {
            error!(bus, error = %e, "Search failed");
            Err(e.into())
        }
    }
}

fn scan_secondary(bus: u32, opener: &dyn BusOpener) -> pinbridge_hardware::Result<Vec<BusAddress>> {
    let mut transport = opener.open(bus)?;
    let found = transport.scan();
    if let Err(e) = transport.close() {
        warn!(bus, error = %e, "Couldn't close search bus");
    }
    found
}
