//! Device handler framework.
//!
//! Every chip family implements [`DeviceHandler`]. Handlers never own the
//! bus or the store; each call receives a [`HandlerContext`] lending the
//! shared bus transport, the state synchronizer and the event sender, and
//! all calls happen on the adapter event loop, one at a time.
//!
//! [`HandlerBase`] carries what every handler needs: identity, lifecycle,
//! object declarations, listener bookkeeping, the poll timer and the
//! interrupt subscription.

use crate::adapter::AdapterEvent;
use crate::error::{AdapterError, Result};
use crate::store::ObjectDeclaration;
use crate::sync::{Listener, StateSync};
use crate::timer::PollTimer;
use pinbridge_core::{BusAddress, DeviceConfig, PinConfig, StateId, StateValue};
use pinbridge_hardware::BusTransport;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle state of a handler.
///
/// `Created -> Started -> Stopped`, or `Created -> Stopped`. A stopped
/// handler cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Created,
    Started,
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Started => write!(f, "Started"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Shared collaborators lent to a handler for the duration of one call.
pub struct HandlerContext<'a> {
    /// Bus transport shared by all handlers.
    pub bus: &'a mut dyn BusTransport,

    /// Acknowledged values and listener tables.
    pub state: &'a mut StateSync,

    /// Adapter event loop, for poll timers.
    pub events: &'a mpsc::Sender<AdapterEvent>,
}

impl<'a> HandlerContext<'a> {
    /// Bundle the collaborators.
    pub fn new(
        bus: &'a mut dyn BusTransport,
        state: &'a mut StateSync,
        events: &'a mpsc::Sender<AdapterEvent>,
    ) -> Self {
        Self { bus, state, events }
    }

    /// Publish a device-confirmed value, logging instead of failing.
    ///
    /// A failed push affects only this id; callers carry on with the rest.
    pub fn acknowledge(&mut self, id: &StateId, value: impl Into<StateValue>) {
        if let Err(e) = self.state.set_acknowledged(id, value) {
            warn!(%id, error = %e, "Couldn't publish acknowledged value");
        }
    }
}

/// Behavior of one chip family.
pub trait DeviceHandler {
    /// Common handler state.
    fn base(&self) -> &HandlerBase;

    /// Mutable common handler state.
    fn base_mut(&mut self) -> &mut HandlerBase;

    /// Declare objects, bring the chip to its configured state, do the first
    /// read and arm polling or interrupt if the device has inputs.
    fn start(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()>;

    /// Release timer, listeners and subscriptions. Safe to call in any state.
    fn stop(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        self.base_mut().release(ctx)
    }

    /// Write request for an output pin. Must not touch the bus when the
    /// resulting register image is unchanged.
    fn write_output(&mut self, ctx: &mut HandlerContext<'_>, pin: usize, value: StateValue) -> Result<()>;

    /// Read inputs. `force` republishes every input, changed or not.
    fn read_inputs(&mut self, ctx: &mut HandlerContext<'_>, force: bool) -> Result<()>;

    /// Poll timer tick.
    fn on_poll(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        self.read_inputs(ctx, false)
    }

    /// Change on the configured interrupt line; the value itself is ignored.
    fn on_interrupt(&mut self, ctx: &mut HandlerContext<'_>, _value: StateValue) -> Result<()> {
        self.read_inputs(ctx, false)
    }

    /// Bus address of the device.
    fn address(&self) -> BusAddress {
        self.base().address()
    }

    /// Current lifecycle state.
    fn lifecycle(&self) -> Lifecycle {
        self.base().lifecycle()
    }
}

/// State shared by every handler implementation.
#[derive(Debug)]
pub struct HandlerBase {
    address: BusAddress,
    family: &'static str,
    name: Option<String>,
    lifecycle: Lifecycle,
    poll_timer: Option<PollTimer>,

    /// Subscribed foreign interrupt id.
    interrupt: Option<String>,

    /// Own ids with a registered output listener.
    outputs: Vec<StateId>,
}

impl HandlerBase {
    /// Create the base for a handler of `family` from its configuration.
    ///
    /// # Errors
    /// Returns an error if the configured address is missing or invalid.
    pub fn new(family: &'static str, config: &DeviceConfig) -> Result<Self> {
        let address = config.bus_address()?;
        Ok(Self {
            address,
            family,
            name: config.name.clone().filter(|name| !name.trim().is_empty()),
            lifecycle: Lifecycle::Created,
            poll_timer: None,
            interrupt: None,
            outputs: Vec::new(),
        })
    }

    pub fn address(&self) -> BusAddress {
        self.address
    }

    /// Address as `0xNN`.
    pub fn hex(&self) -> String {
        self.address.to_hex()
    }

    /// Chip family tag.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Label used in object names: the configured name, or the family.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.family)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle == Lifecycle::Started
    }

    /// Interval of the armed poll timer.
    pub fn poll_period(&self) -> Option<Duration> {
        self.poll_timer.as_ref().map(PollTimer::period)
    }

    /// Subscribed interrupt id.
    pub fn interrupt(&self) -> Option<&str> {
        self.interrupt.as_deref()
    }

    /// Fail unless the handler can still be started.
    pub fn ensure_startable(&self) -> Result<()> {
        if self.lifecycle != Lifecycle::Created {
            return Err(AdapterError::InvalidLifecycle {
                address: self.address,
                from: self.lifecycle,
                to: Lifecycle::Started,
            });
        }
        Ok(())
    }

    /// Enter `Started`.
    pub fn mark_started(&mut self) -> Result<()> {
        self.ensure_startable()?;
        self.lifecycle = Lifecycle::Started;
        info!(address = %self.address, family = self.family, "Device started");
        Ok(())
    }

    /// Declare the device object: `"<hex> (<label>)"`.
    pub fn declare_device(&self, ctx: &mut HandlerContext<'_>, native: serde_json::Value) -> Result<()> {
        let name = format!("{} ({})", self.hex(), self.label());
        ctx.state.declare_object(
            &StateId::device(self.address),
            ObjectDeclaration::device(name, native),
        )
    }

    /// Declare the state object of one pin according to its direction.
    pub fn declare_pin(&self, ctx: &mut HandlerContext<'_>, pin: usize, config: PinConfig) -> Result<()> {
        let native = serde_json::to_value(config)?;
        let object = if config.is_input() {
            ObjectDeclaration::input(format!("{} Input {pin}", self.hex()), native)
        } else {
            ObjectDeclaration::output(format!("{} Output {pin}", self.hex()), native)
        };
        ctx.state.declare_object(&StateId::pin(self.address, pin), object)
    }

    /// Route write requests for an output pin to this handler.
    pub fn listen_output(&mut self, ctx: &mut HandlerContext<'_>, pin: usize) {
        let id = StateId::pin(self.address, pin);
        let listener = Listener::Output {
            address: self.address,
            pin,
        };
        if let Some(previous) = ctx.state.add_local_listener(&id, listener) {
            warn!(%id, ?previous, "Replaced existing listener");
        }
        self.outputs.push(id);
    }

    /// Arm the poll timer for inputs.
    pub fn arm_polling(&mut self, ctx: &mut HandlerContext<'_>, period: Duration) {
        debug!(address = %self.address, period_ms = period.as_millis() as u64, "Polling enabled");
        self.poll_timer = Some(PollTimer::arm(self.address, period, ctx.events.clone()));
    }

    /// Subscribe to a foreign interrupt line if the object exists.
    ///
    /// A missing object or a failed subscription is logged and leaves the
    /// device running without interrupt wiring.
    pub fn attach_interrupt(&mut self, ctx: &mut HandlerContext<'_>, id: &str) {
        match ctx.state.foreign_object_exists(id) {
            Ok(true) => {}
            Ok(false) => {
                warn!(address = %self.address, interrupt = id, "Interrupt object not found");
                return;
            }
            Err(e) => {
                warn!(address = %self.address, interrupt = id, error = %e, "Couldn't look up interrupt object");
                return;
            }
        }
        let listener = Listener::Interrupt {
            address: self.address,
        };
        match ctx.state.add_foreign_listener(id, listener) {
            Ok(_) => {
                debug!(address = %self.address, interrupt = id, "Interrupt enabled");
                self.interrupt = Some(id.to_string());
            }
            Err(e) => {
                warn!(address = %self.address, interrupt = id, error = %e, "Couldn't subscribe to interrupt");
            }
        }
    }

    /// Cancel the timer, drop listeners and subscriptions, enter `Stopped`.
    ///
    /// Every resource is released even if an unsubscribe fails; the first
    /// failure is returned.
    pub fn release(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        if let Some(timer) = self.poll_timer.take() {
            timer.cancel();
        }
        for id in self.outputs.drain(..) {
            ctx.state.remove_local_listener(&id);
        }
        let result = match self.interrupt.take() {
            Some(id) => ctx
                .state
                .remove_foreign_listener(&id, self.address)
                .map(|_| ()),
            None => Ok(()),
        };
        if self.lifecycle != Lifecycle::Stopped {
            debug!(address = %self.address, from = %self.lifecycle, "Device stopped");
        }
        self.lifecycle = Lifecycle::Stopped;
        result
    }
}
