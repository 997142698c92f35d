//! Device handler implementations and dispatch.
//!
//! Built-in chip families get their own [`AnyDeviceHandler`] variant so the
//! manager dispatches to them without boxing. Families registered at runtime
//! through [`DeviceRegistry::register`] travel as [`AnyDeviceHandler::Custom`].
//!
//! # Examples
//!
//! ```
//! use pinbridge_adapter::devices::{AnyDeviceHandler, DeviceRegistry};
//! use pinbridge_adapter::handler::{DeviceHandler, Lifecycle};
//! use pinbridge_core::DeviceConfig;
//!
//! let registry = DeviceRegistry::default();
//! let handler = registry.create(&DeviceConfig::new(0x20, "pcf8574")).unwrap();
//!
//! assert!(matches!(handler, AnyDeviceHandler::Pcf8574(_)));
//! assert_eq!(handler.lifecycle(), Lifecycle::Created);
//! ```

pub mod big_endian;
pub mod mcp23017;
pub mod pcf8574;
pub mod registry;

pub use big_endian::{BigEndianRegisters, swap_word};
pub use mcp23017::Mcp23017;
pub use pcf8574::Pcf8574;
pub use registry::{DeviceRegistry, HandlerFactory};

use crate::error::Result;
use crate::handler::{DeviceHandler, HandlerBase, HandlerContext};
use pinbridge_core::StateValue;
use std::fmt;

/// Enum wrapper for device handler dispatch.
pub enum AnyDeviceHandler {
    /// PCF8574 / PCF8574A byte expander.
    Pcf8574(Pcf8574),

    /// MCP23017 word expander.
    Mcp23017(Mcp23017),

    /// Family registered at runtime.
    Custom(Box<dyn DeviceHandler + Send>),
}

impl fmt::Debug for AnyDeviceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcf8574(handler) => f.debug_tuple("Pcf8574").field(handler).finish(),
            Self::Mcp23017(handler) => f.debug_tuple("Mcp23017").field(handler).finish(),
            Self::Custom(handler) => f.debug_tuple("Custom").field(handler.base()).finish(),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $handler:ident => $body:expr) => {
        match $self {
            Self::Pcf8574($handler) => $body,
            Self::Mcp23017($handler) => $body,
            Self::Custom($handler) => $body,
        }
    };
}

impl DeviceHandler for AnyDeviceHandler {
    fn base(&self) -> &HandlerBase {
        dispatch!(self, handler => handler.base())
    }

    fn base_mut(&mut self) -> &mut HandlerBase {
        dispatch!(self, handler => handler.base_mut())
    }

    fn start(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        dispatch!(self, handler => handler.start(ctx))
    }

    fn stop(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        dispatch!(self, handler => handler.stop(ctx))
    }

    fn write_output(&mut self, ctx: &mut HandlerContext<'_>, pin: usize, value: StateValue) -> Result<()> {
        dispatch!(self, handler => handler.write_output(ctx, pin, value))
    }

    fn read_inputs(&mut self, ctx: &mut HandlerContext<'_>, force: bool) -> Result<()> {
        dispatch!(self, handler => handler.read_inputs(ctx, force))
    }

    fn on_poll(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        dispatch!(self, handler => handler.on_poll(ctx))
    }

    fn on_interrupt(&mut self, ctx: &mut HandlerContext<'_>, value: StateValue) -> Result<()> {
        dispatch!(self, handler => handler.on_interrupt(ctx, value))
    }
}
