//! Device registry and lifecycle manager.
//!
//! Turns configuration records into handlers, starts and stops them, and
//! dispatches routed state changes and poll ticks. A bad record or a failing
//! handler never affects its neighbours: construction problems skip the
//! record with a warning, start failures are logged, and shutdown attempts
//! every handler before reporting.

use crate::devices::{AnyDeviceHandler, DeviceRegistry};
use crate::error::{AdapterError, Result};
use crate::handler::{DeviceHandler, HandlerContext, Lifecycle};
use crate::sync::{Listener, Route};
use pinbridge_core::{BusAddress, DeviceConfig, StateValue};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Configuration record that did not produce a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDevice {
    /// Position in the configured device list.
    pub index: usize,

    pub address: Option<u64>,
    pub kind: Option<String>,

    /// Why the record was skipped.
    pub reason: String,
}

/// Handler counts per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub created: usize,
    pub started: usize,
    pub stopped: usize,
}

/// Owns every device handler, keyed by address.
#[derive(Debug, Default)]
pub struct DeviceManager {
    handlers: BTreeMap<BusAddress, AnyDeviceHandler>,
}

impl DeviceManager {
    /// Manager without devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build handlers for every usable record.
    ///
    /// Records with a missing or invalid address, a missing or unknown type,
    /// or an address already taken are skipped and reported.
    pub fn from_config(devices: &[DeviceConfig], registry: &DeviceRegistry) -> (Self, Vec<SkippedDevice>) {
        let mut manager = Self::new();
        let mut skipped = Vec::new();

        for (index, config) in devices.iter().enumerate() {
            let kind = config.kind.clone();
            let label = kind.as_deref().unwrap_or("device");
            let mut skip = |reason: String| {
                warn!(index, address = ?config.address, kind = label, %reason, "Couldn't create device");
                skipped.push(SkippedDevice {
                    index,
                    address: config.address,
                    kind: kind.clone(),
                    reason,
                });
            };

            let handler = match registry.create(config) {
                Ok(handler) => handler,
                Err(e) => {
                    skip(e.to_string());
                    continue;
                }
            };
            let address = handler.address();
            if manager.handlers.contains_key(&address) {
                skip(pinbridge_core::Error::DuplicateAddress(address.to_hex()).to_string());
                continue;
            }
            info!(%address, kind = label, "Created device");
            manager.handlers.insert(address, handler);
        }

        (manager, skipped)
    }

    /// Add a handler built elsewhere.
    ///
    /// # Errors
    /// Fails if a handler already owns the address.
    pub fn insert(&mut self, handler: AnyDeviceHandler) -> Result<()> {
        let address = handler.address();
        if self.handlers.contains_key(&address) {
            return Err(pinbridge_core::Error::DuplicateAddress(address.to_hex()).into());
        }
        self.handlers.insert(address, handler);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Configured addresses, ascending.
    pub fn addresses(&self) -> Vec<BusAddress> {
        self.handlers.keys().copied().collect()
    }

    pub fn handler(&self, address: BusAddress) -> Option<&AnyDeviceHandler> {
        self.handlers.get(&address)
    }

    pub fn handler_mut(&mut self, address: BusAddress) -> Option<&mut AnyDeviceHandler> {
        self.handlers.get_mut(&address)
    }

    pub fn stats(&self) -> ManagerStats {
        self.handlers
            .values()
            .fold(ManagerStats::default(), |mut stats, handler| {
                match handler.lifecycle() {
                    Lifecycle::Created => stats.created += 1,
                    Lifecycle::Started => stats.started += 1,
                    Lifecycle::Stopped => stats.stopped += 1,
                }
                stats
            })
    }

    /// Start every handler; returns how many started.
    pub fn start_all(&mut self, ctx: &mut HandlerContext<'_>) -> usize {
        let mut started = 0;
        for (address, handler) in &mut self.handlers {
            match handler.start(ctx) {
                Ok(()) => started += 1,
                Err(e) => warn!(%address, error = %e, "Couldn't start device"),
            }
        }
        started
    }

    /// Stop every handler, returning the failures.
    pub fn stop_all(&mut self, ctx: &mut HandlerContext<'_>) -> Vec<(BusAddress, AdapterError)> {
        let mut failures = Vec::new();
        for (address, handler) in &mut self.handlers {
            if let Err(e) = handler.stop(ctx) {
                warn!(%address, error = %e, "Couldn't stop device");
                failures.push((*address, e));
            }
        }
        failures
    }

    /// Deliver a routed change to its handler.
    ///
    /// # Errors
    /// Returns `UnsupportedStateChange` for an unowned id, or the handler's
    /// error.
    pub fn dispatch(&mut self, ctx: &mut HandlerContext<'_>, route: Route) -> Result<()> {
        match route {
            Route::Local { listener, value, .. } | Route::Foreign { listener, value } => {
                self.deliver(ctx, listener, value)
            }
            Route::AckEcho => Ok(()),
            Route::Unsupported { id } => Err(AdapterError::UnsupportedStateChange(id)),
        }
    }

    fn deliver(&mut self, ctx: &mut HandlerContext<'_>, listener: Listener, value: StateValue) -> Result<()> {
        let address = listener.address();
        let handler = self
            .handlers
            .get_mut(&address)
            .ok_or(AdapterError::UnknownDevice(address))?;
        if handler.lifecycle() != Lifecycle::Started {
            debug!(%address, lifecycle = %handler.lifecycle(), "Ignoring change for inactive device");
            return Ok(());
        }
        match listener {
            Listener::Output { pin, .. } => handler.write_output(ctx, pin, value),
            Listener::Interrupt { .. } => handler.on_interrupt(ctx, value),
        }
    }

    /// Run a poll tick for one handler.
    ///
    /// Ticks for handlers that are not running are dropped.
    pub fn poll(&mut self, ctx: &mut HandlerContext<'_>, address: BusAddress) -> Result<()> {
        let handler = self
            .handlers
            .get_mut(&address)
            .ok_or(AdapterError::UnknownDevice(address))?;
        if handler.lifecycle() != Lifecycle::Started {
            trace!(%address, "Dropping poll for inactive device");
            return Ok(());
        }
        handler.on_poll(ctx)
    }
}
