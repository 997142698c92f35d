//! MCP23017 16-bit port expander.
//!
//! The chip runs in its power-on layout (IOCON.BANK = 0), where each A/B
//! register pair can be transferred as one word, port A first. Pins 0..=7
//! are port A and pins 8..=15 are port B. Register images are kept in wire
//! order: port A in the high byte, port B in the low byte.

use crate::devices::big_endian::BigEndianRegisters;
use crate::error::{AdapterError, Result};
use crate::handler::{DeviceHandler, HandlerBase, HandlerContext};
use pinbridge_core::constants::{
    MCP23017_GPIO, MCP23017_GPPU, MCP23017_IODIR, MCP23017_IPOL, MCP23017_OLAT,
    MCP23017_PIN_COUNT,
};
use pinbridge_core::{DeviceConfig, PinConfig, PinDirection, StateId, StateValue, hex::to_hex_string};
use tracing::{debug, error, trace};

/// Bit of pin `pin` in a register image.
#[inline]
pub fn pin_mask(pin: usize) -> u16 {
    if pin < 8 { 1 << (pin + 8) } else { 1 << (pin - 8) }
}

/// Handler for one MCP23017 expander.
#[derive(Debug)]
pub struct Mcp23017 {
    base: HandlerBase,
    registers: BigEndianRegisters,
    config: DeviceConfig,
    pins: [PinConfig; MCP23017_PIN_COUNT],

    /// OLAT image.
    write_value: u16,

    /// Last GPIO value read.
    read_value: u16,
}

impl Mcp23017 {
    /// Family tag.
    pub const FAMILY: &'static str = "MCP23017";

    /// Create a handler from its configuration.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let base = HandlerBase::new(Self::FAMILY, &config)?;
        let registers = BigEndianRegisters::new(base.address());
        let pins = std::array::from_fn(|pin| config.pin(pin));
        Ok(Self {
            base,
            registers,
            config,
            pins,
            write_value: 0,
            read_value: 0,
        })
    }

    pub fn write_value(&self) -> u16 {
        self.write_value
    }

    pub fn read_value(&self) -> u16 {
        self.read_value
    }

    fn hex(value: u16) -> String {
        to_hex_string(u32::from(value), 4)
    }

    /// IODIR image; bit set = input.
    pub fn direction_mask(&self) -> u16 {
        self.mask_where(PinConfig::is_input)
    }

    /// GPPU image; bit set = pull-up enabled.
    pub fn pull_up_mask(&self) -> u16 {
        self.mask_where(|config| config.dir == PinDirection::InputPullUp)
    }

    fn mask_where(&self, predicate: impl Fn(&PinConfig) -> bool) -> u16 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, config)| predicate(*config))
            .fold(0, |mask, (pin, _)| mask | pin_mask(pin))
    }

    fn write_register(&self, ctx: &mut HandlerContext<'_>, name: &str, command: u8, value: u16) -> bool {
        match self.registers.write_word(&mut *ctx.bus, command, value) {
            Ok(()) => true,
            Err(e) => {
                error!(address = %self.base.address(), register = name, error = %e, "Couldn't write register");
                false
            }
        }
    }

    /// Write the output latch. Returns whether it succeeded.
    pub fn send_current_value(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        trace!(address = %self.base.address(), value = %Self::hex(self.write_value), "Sending");
        self.write_register(ctx, "OLAT", MCP23017_OLAT, self.write_value)
    }

    /// Read GPIO and publish input pins; see the PCF8574 handler for the
    /// meaning of `force`.
    pub fn read_current_value(&mut self, ctx: &mut HandlerContext<'_>, force: bool) {
        let address = self.base.address();
        let value = match self.registers.read_word(&mut *ctx.bus, MCP23017_GPIO) {
            Ok(value) => value,
            Err(e) => {
                error!(%address, error = %e, "Couldn't read current value");
                return;
            }
        };

        let old_value = self.read_value;
        self.read_value = value;
        if value == old_value && !force {
            return;
        }

        debug!(%address, value = %Self::hex(value), "Read");
        for (pin, config) in self.pins.iter().enumerate() {
            let mask = pin_mask(pin);
            if !config.is_input() || (!force && (old_value ^ value) & mask == 0) {
                continue;
            }
            ctx.acknowledge(
                &StateId::pin(address, pin),
                (value & mask != 0) != config.is_inverted(),
            );
        }
    }

    /// Set one output pin; same contract as the PCF8574 handler.
    pub fn change_output(&mut self, ctx: &mut HandlerContext<'_>, pin: usize, value: bool) -> Result<()> {
        let address = self.base.address();
        let config = self
            .pins
            .get(pin)
            .copied()
            .ok_or_else(|| AdapterError::invalid_pin(address, pin, "no such pin"))?;
        if config.is_input() {
            return Err(AdapterError::invalid_pin(address, pin, "pin is an input"));
        }

        let mask = pin_mask(pin);
        let old_value = self.write_value;
        let new_value = if value != config.is_inverted() {
            old_value | mask
        } else {
            old_value & !mask
        };
        if new_value == old_value {
            trace!(%address, pin, "Output unchanged");
            return Ok(());
        }

        self.write_value = new_value;
        if !self.send_current_value(ctx) {
            self.write_value = old_value;
            return Ok(());
        }
        ctx.acknowledge(&StateId::pin(address, pin), value);
        Ok(())
    }
}

impl DeviceHandler for Mcp23017 {
    fn base(&self) -> &HandlerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut HandlerBase {
        &mut self.base
    }

    fn start(&mut self, ctx: &mut HandlerContext<'_>) -> Result<()> {
        self.base.ensure_startable()?;
        let address = self.base.address();
        debug!(%address, "Starting");

        self.base
            .declare_device(ctx, serde_json::to_value(&self.config)?)?;
        for (pin, config) in self.pins.iter().enumerate() {
            self.base.declare_pin(ctx, pin, *config)?;
        }
        self.base.mark_started()?;

        let mut defaults = Vec::new();
        self.write_value = 0;
        for (pin, config) in self.pins.iter().enumerate() {
            if config.is_input() {
                continue;
            }
            self.base.listen_output(ctx, pin);
            let value = match ctx.state.cached_value(&StateId::pin(address, pin)) {
                Some(value) => value.as_bool(),
                None => {
                    defaults.push(pin);
                    config.is_inverted()
                }
            };
            if value != config.is_inverted() {
                self.write_value |= pin_mask(pin);
            }
        }

        let direction = self.direction_mask();
        let pull_up = self.pull_up_mask();
        debug!(
            %address,
            iodir = %Self::hex(direction),
            gppu = %Self::hex(pull_up),
            olat = %Self::hex(self.write_value),
            "Configuring"
        );
        self.write_register(ctx, "IODIR", MCP23017_IODIR, direction);
        self.write_register(ctx, "IPOL", MCP23017_IPOL, 0);
        self.write_register(ctx, "GPPU", MCP23017_GPPU, pull_up);

        if self.send_current_value(ctx) {
            for pin in defaults {
                ctx.acknowledge(&StateId::pin(address, pin), self.pins[pin].is_inverted());
            }
        }

        self.read_current_value(ctx, true);

        if direction != 0 {
            if let Some(period) = self.config.polling_period() {
                self.base.arm_polling(ctx, period);
            }
            if let Some(interrupt) = self.config.interrupt_id() {
                self.base.attach_interrupt(ctx, interrupt);
            }
        }
        Ok(())
    }

    fn write_output(&mut self, ctx: &mut HandlerContext<'_>, pin: usize, value: StateValue) -> Result<()> {
        self.change_output(ctx, pin, value.as_bool())
    }

    fn read_inputs(&mut self, ctx: &mut HandlerContext<'_>, force: bool) -> Result<()> {
        self.read_current_value(ctx, force);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pinbridge_core::BusAddress;
    use pinbridge_hardware::mock::BusOp;
    use rstest::rstest;

    fn addr() -> BusAddress {
        BusAddress::new(0x20).unwrap()
    }

    /// Port A outputs, port B inputs (8..=11 pulled up, 12..=15 floating).
    fn split_config() -> DeviceConfig {
        let outputs = [PinConfig::output(); 8];
        let pulled = [PinConfig::input(); 4];
        let floating = [PinConfig {
            dir: PinDirection::InputNoPullUp,
            inv: None,
        }; 4];
        DeviceConfig::new(0x20, "MCP23017")
            .with_pins(outputs.into_iter().chain(pulled).chain(floating))
    }

    fn word_writes(fixture: &Fixture) -> Vec<(u8, u16)> {
        fixture
            .bus_handle
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::WriteWord { command, value, .. } => Some((command, value)),
                _ => None,
            })
            .collect()
    }

    #[rstest]
    #[case(0, 0x0100)]
    #[case(7, 0x8000)]
    #[case(8, 0x0001)]
    #[case(15, 0x0080)]
    fn test_pin_mask(#[case] pin: usize, #[case] mask: u16) {
        assert_eq!(pin_mask(pin), mask);
    }

    #[test]
    fn test_start_configures_registers() {
        let mut fixture = Fixture::new();
        let mut handler = Mcp23017::new(split_config()).unwrap();

        handler.start(&mut fixture.context()).unwrap();

        assert_eq!(handler.direction_mask(), 0x00FF);
        assert_eq!(handler.pull_up_mask(), 0x000F);
        // images are byte-swapped on the wire
        assert_eq!(
            word_writes(&fixture),
            vec![
                (MCP23017_IODIR, 0xFF00),
                (MCP23017_IPOL, 0x0000),
                (MCP23017_GPPU, 0x0F00),
                (MCP23017_OLAT, 0x0000),
            ]
        );
        assert_eq!(
            fixture
                .bus_handle
                .count(|op| matches!(op, BusOp::ReadWord { command: MCP23017_GPIO, .. })),
            1
        );
        assert_eq!(fixture.store.object_count(), 17);
    }

    #[test]
    fn test_forced_read_publishes_port_b() {
        let mut fixture = Fixture::new();
        // port B = 0b0000_0101 arrives in the high byte of the wire word
        fixture.bus_handle.set_word(addr(), MCP23017_GPIO, 0x0500);
        let mut handler = Mcp23017::new(split_config()).unwrap();

        handler.start(&mut fixture.context()).unwrap();

        assert_eq!(handler.read_value(), 0x0005);
        let level = |pin: usize| fixture.store.state(&format!("i2c.0.0x20.{pin}")).unwrap().value;
        assert_eq!(level(8), StateValue::Bool(true));
        assert_eq!(level(9), StateValue::Bool(false));
        assert_eq!(level(10), StateValue::Bool(true));
        assert_eq!(level(15), StateValue::Bool(false));
    }

    #[test]
    fn test_output_change_writes_latch() {
        let mut fixture = Fixture::new();
        let mut handler = Mcp23017::new(split_config()).unwrap();
        handler.start(&mut fixture.context()).unwrap();
        fixture.bus_handle.clear_operations();

        handler.change_output(&mut fixture.context(), 1, true).unwrap();
        handler.change_output(&mut fixture.context(), 1, true).unwrap();

        assert_eq!(handler.write_value(), 0x0200);
        assert_eq!(word_writes(&fixture), vec![(MCP23017_OLAT, 0x0002)]);
        assert_eq!(
            fixture.store.state("i2c.0.0x20.1").unwrap().value,
            StateValue::Bool(true)
        );
    }

    #[test]
    fn test_changed_inputs_only() {
        let mut fixture = Fixture::new();
        let mut handler = Mcp23017::new(split_config()).unwrap();
        handler.start(&mut fixture.context()).unwrap();
        fixture.store.clear_writes();

        fixture.bus_handle.set_word(addr(), MCP23017_GPIO, 0x8000);
        handler.read_current_value(&mut fixture.context(), false);

        let writes = fixture.store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].id, "i2c.0.0x20.15");
    }

    #[test]
    fn test_input_pin_rejects_writes() {
        let mut fixture = Fixture::new();
        let mut handler = Mcp23017::new(split_config()).unwrap();
        handler.start(&mut fixture.context()).unwrap();

        assert!(handler.change_output(&mut fixture.context(), 12, true).is_err());
        assert!(handler.change_output(&mut fixture.context(), 16, true).is_err());
    }
}
