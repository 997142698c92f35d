//! Adapter runtime.
//!
//! One task owns the bus, the state synchronizer and every handler. Store
//! notifications, poll ticks, admin requests and shutdown all arrive on one
//! bounded channel and are processed to completion, one at a time, which
//! serializes every bus transaction without a lock.
//!
//! ```text
//! ┌──────────────┐
//! │ State store  │──StateChange──┐
//! └──────────────┘               │      ┌──────────────────────────┐
//! ┌──────────────┐               ├─────►│ Adapter event loop       │
//! │ Poll timers  │──Poll(addr)───┤      │  StateSync ─► handlers   │──► Bus
//! └──────────────┘               │      └──────────────────────────┘
//! ┌──────────────┐               │
//! │ AdapterHandle│──Admin/Stop───┘
//! └──────────────┘
//! ```

use crate::admin::{self, AdminCommand, AdminContext, AdminResponse};
use crate::devices::DeviceRegistry;
use crate::error::{AdapterError, Result};
use crate::handler::HandlerContext;
use crate::manager::{DeviceManager, SkippedDevice};
use crate::store::{BoxedStore, StateChange};
use crate::sync::StateSync;
use pinbridge_core::{AdapterConfig, BusAddress};
use pinbridge_hardware::{BoxedTransport, BusError, BusOpener};
use std::ops::ControlFlow;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

/// Capacity of the adapter event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Input of the adapter event loop.
#[derive(Debug)]
pub enum AdapterEvent {
    /// Change notification from the state store.
    StateChange(StateChange),

    /// Poll timer tick for one device.
    Poll(BusAddress),

    /// Administrative request with its reply channel.
    Admin {
        command: AdminCommand,
        reply: oneshot::Sender<Result<AdminResponse>>,
    },

    /// Stop every device, close the bus and leave the loop.
    Shutdown { done: oneshot::Sender<()> },
}

/// The adapter: bus, state and devices behind one event loop.
pub struct Adapter {
    bus_number: u32,

    /// `None` once shut down.
    bus: Option<BoxedTransport>,

    opener: Box<dyn BusOpener + Send>,
    state: StateSync,
    manager: DeviceManager,
    skipped: Vec<SkippedDevice>,
    sender: mpsc::Sender<AdapterEvent>,
    receiver: mpsc::Receiver<AdapterEvent>,
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("bus_number", &self.bus_number)
            .field("open", &self.bus.is_some())
            .field("state", &self.state)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl Adapter {
    /// Create an adapter with the built-in device families.
    ///
    /// # Errors
    /// Fails if the bus cannot be opened or the store cannot be queried for
    /// acknowledged values. Bad device records are skipped, not fatal.
    pub fn new(
        config: AdapterConfig,
        store: BoxedStore,
        opener: impl BusOpener + Send + 'static,
    ) -> Result<(Self, AdapterHandle)> {
        Self::with_registry(config, store, opener, &DeviceRegistry::default())
    }

    /// Create an adapter with a custom device registry.
    pub fn with_registry(
        config: AdapterConfig,
        store: BoxedStore,
        opener: impl BusOpener + Send + 'static,
        registry: &DeviceRegistry,
    ) -> Result<(Self, AdapterHandle)> {
        info!(bus = config.bus_number, devices = config.devices.len(), "Opening bus");
        let bus = opener.open(config.bus_number)?;

        let mut state = StateSync::new(config.namespace.clone(), store);
        state.seed()?;

        let (manager, skipped) = DeviceManager::from_config(&config.devices, registry);
        if manager.is_empty() {
            info!("No devices configured");
        }

        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = AdapterHandle {
            sender: sender.clone(),
        };

        let adapter = Self {
            bus_number: config.bus_number,
            bus: Some(bus),
            opener: Box::new(opener),
            state,
            manager,
            skipped,
            sender,
            receiver,
        };
        Ok((adapter, handle))
    }

    /// New handle to this adapter.
    pub fn handle(&self) -> AdapterHandle {
        AdapterHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn state(&self) -> &StateSync {
        &self.state
    }

    pub fn manager(&self) -> &DeviceManager {
        &self.manager
    }

    /// Device records that did not produce a handler.
    pub fn skipped(&self) -> &[SkippedDevice] {
        &self.skipped
    }

    /// Check if the bus is still open.
    pub fn is_open(&self) -> bool {
        self.bus.is_some()
    }

    fn with_context<R>(
        &mut self,
        f: impl FnOnce(&mut DeviceManager, &mut HandlerContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let bus = self.bus.as_mut().ok_or(BusError::Closed)?;
        let mut ctx = HandlerContext::new(&mut **bus, &mut self.state, &self.sender);
        f(&mut self.manager, &mut ctx)
    }

    /// Start every device; returns how many started.
    ///
    /// Must be called from within a Tokio runtime when any device polls.
    pub fn start(&mut self) -> Result<usize> {
        self.with_context(|manager, ctx| Ok(manager.start_all(ctx)))
    }

    /// Process one event to completion.
    ///
    /// Returns `Break` after a shutdown.
    ///
    /// # Errors
    /// Returns the failure of a state change or poll; admin failures go to
    /// the requester instead.
    pub fn process(&mut self, event: AdapterEvent) -> Result<ControlFlow<()>> {
        match event {
            AdapterEvent::StateChange(change) => {
                trace!(id = %change.id, value = %change.value, ack = change.ack, "State change");
                let route = self.state.route(&change);
                self.with_context(|manager, ctx| manager.dispatch(ctx, route))?;
            }
            AdapterEvent::Poll(address) => {
                self.with_context(|manager, ctx| manager.poll(ctx, address))?;
            }
            AdapterEvent::Admin { command, reply } => {
                let result = self.admin(&command);
                if reply.send(result).is_err() {
                    debug!(?command, "Admin requester went away");
                }
            }
            AdapterEvent::Shutdown { done } => {
                let result = self.shutdown();
                let _ = done.send(());
                result?;
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn admin(&mut self, command: &AdminCommand) -> Result<AdminResponse> {
        let bus = self.bus.as_mut().ok_or(BusError::Closed)?;
        let mut ctx = AdminContext {
            bus: &mut **bus,
            bus_number: self.bus_number,
            opener: &*self.opener,
        };
        admin::execute(command, &mut ctx)
    }

    /// Stop every device, then close the bus.
    ///
    /// Individual stop failures are logged and do not prevent the bus from
    /// closing. Calling this again is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(mut bus) = self.bus.take() else {
            return Ok(());
        };
        info!(bus = self.bus_number, "Shutting down");

        let mut ctx = HandlerContext::new(&mut *bus, &mut self.state, &self.sender);
        let failures = self.manager.stop_all(&mut ctx);
        if !failures.is_empty() {
            warn!(failed = failures.len(), "Some devices did not stop cleanly");
        }

        bus.close()?;
        debug!(bus = self.bus_number, "Bus closed");
        Ok(())
    }

    /// Start the devices and process events until shutdown.
    ///
    /// # Errors
    /// Fails if the devices cannot be started or the bus does not close
    /// cleanly on shutdown.
    pub async fn run(mut self) -> Result<()> {
        let started = self.start()?;
        info!(started, configured = self.manager.len(), "Adapter running");

        while let Some(event) = self.receiver.recv().await {
            match self.process(event) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => return Ok(()),
                // shutdown already ran; the bus close failed
                Err(e) if !self.is_open() => return Err(e),
                Err(e) => error!(error = %e, "Event failed"),
            }
        }
        self.shutdown()
    }
}

/// Cloneable handle feeding the adapter event loop.
#[derive(Debug, Clone)]
pub struct AdapterHandle {
    sender: mpsc::Sender<AdapterEvent>,
}

impl AdapterHandle {
    /// Deliver a change notification from the state store.
    pub async fn notify_state_change(&self, change: StateChange) -> Result<()> {
        self.sender
            .send(AdapterEvent::StateChange(change))
            .await
            .map_err(|_| AdapterError::ChannelClosed)
    }

    /// Run an admin command and wait for its result.
    pub async fn admin(&self, command: AdminCommand) -> Result<AdminResponse> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(AdapterEvent::Admin { command, reply })
            .await
            .map_err(|_| AdapterError::ChannelClosed)?;
        response.await.map_err(|_| AdapterError::ChannelClosed)?
    }

    /// Stop the adapter and wait until the bus is closed.
    pub async fn shutdown(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.sender
            .send(AdapterEvent::Shutdown { done })
            .await
            .map_err(|_| AdapterError::ChannelClosed)?;
        finished.await.map_err(|_| AdapterError::ChannelClosed)
    }
}
