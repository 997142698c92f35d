//! PCF8574 8-bit quasi-bidirectional port expander.
//!
//! The chip has no direction register. Writing a 1 releases a pin (weak
//! pull-up, usable as input), writing a 0 drives it low. A read returns the
//! level on all eight pins. Every read is therefore preceded by a write of
//! the current output image, so input pins are guaranteed released and
//! outputs stay where they are.
//!
//! Some boards return `0xFF` on a read right after switching; a non-forced
//! read retries such a value a bounded number of times before accepting it.

use crate::error::{AdapterError, Result};
use crate::handler::{DeviceHandler, HandlerBase, HandlerContext};
use pinbridge_core::constants::{GLITCH_READ_ATTEMPTS, GLITCH_READ_VALUE, PCF8574_PIN_COUNT};
use pinbridge_core::{DeviceConfig, PinConfig, StateId, StateValue, hex::to_hex_string};
use tracing::{debug, error, trace};

/// Handler for one PCF8574 (or PCF8574A) expander.
#[derive(Debug)]
pub struct Pcf8574 {
    base: HandlerBase,
    config: DeviceConfig,
    pins: [PinConfig; PCF8574_PIN_COUNT],

    /// Output image; bit set = pin high or released.
    write_value: u8,

    /// Last value read from the chip.
    read_value: u8,
}

impl Pcf8574 {
    /// Family tag.
    pub const FAMILY: &'static str = "PCF8574";

    /// Create a handler from its configuration.
    ///
    /// Pins missing from the configuration are non-inverted outputs.
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let base = HandlerBase::new(Self::FAMILY, &config)?;
        let pins = std::array::from_fn(|pin| config.pin(pin));
        Ok(Self {
            base,
            config,
            pins,
            write_value: 0,
            read_value: 0,
        })
    }

    /// Current output image.
    pub fn write_value(&self) -> u8 {
        self.write_value
    }

    /// Last value read.
    pub fn read_value(&self) -> u8 {
        self.read_value
    }

    pub fn pin_config(&self, pin: usize) -> Option<PinConfig> {
        self.pins.get(pin).copied()
    }

    fn has_inputs(&self) -> bool {
        self.pins.iter().any(PinConfig::is_input)
    }

    fn hex(value: u8) -> String {
        to_hex_string(u32::from(value), 2)
    }

    /// Write the output image to the chip. Returns whether it succeeded.
    pub fn send_current_value(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        let address = self.base.address();
        trace!(%address, value = %Self::hex(self.write_value), "Sending");
        match ctx.bus.write_byte(address, self.write_value) {
            Ok(()) => true,
            Err(e) => {
                error!(%address, error = %e, "Couldn't send current value");
                false
            }
        }
    }

    /// Read the chip and publish input pins.
    ///
    /// Without `force`, only pins whose level changed are published and an
    /// all-ones read is retried. With `force`, every input pin is published
    /// and the first read is accepted.
    pub fn read_current_value(&mut self, ctx: &mut HandlerContext<'_>, force: bool) {
        let address = self.base.address();
        let old_value = self.read_value;

        let mut attempt = 0;
        let value = loop {
            attempt += 1;
            if let Err(e) = ctx.bus.write_byte(address, self.write_value) {
                error!(%address, error = %e, "Couldn't release inputs before reading");
                return;
            }
            match ctx.bus.read_byte(address) {
                Ok(value) if !force && value == GLITCH_READ_VALUE && attempt < GLITCH_READ_ATTEMPTS => {
                    trace!(%address, attempt, "Read all ones, retrying");
                }
                Ok(value) => break value,
                Err(e) => {
                    error!(%address, error = %e, "Couldn't read current value");
                    return;
                }
            }
        };

        self.read_value = value;
        if value == old_value && !force {
            return;
        }

        debug!(%address, value = %Self::hex(value), "Read");
        for (pin, config) in self.pins.iter().enumerate() {
            let mask = 1u8 << pin;
            if !config.is_input() || (!force && (old_value ^ value) & mask == 0) {
                continue;
            }
            let level = value & mask != 0;
            ctx.acknowledge(
                &StateId::pin(address, pin),
                level != config.is_inverted(),
            );
        }
    }

    /// Set one output pin.
    ///
    /// Nothing is written when the image does not change. A failed write
    /// restores the previous image and publishes nothing.
    pub fn change_output(&mut self, ctx: &mut HandlerContext<'_>, pin: usize, value: bool) -> Result<()> {
        let address = self.base.address();
        let config = self
            .pin_config(pin)
            .ok_or_else(|| AdapterError::invalid_pin(address, pin, "no such pin"))?;
        if config.is_input() {
            return Err(AdapterError::invalid_pin(address, pin, "pin is an input"));
        }

        let mask = 1u8 << pin;
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

impl DeviceHandler for Pcf8574 {
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
            let mask = 1u8 << pin;
            if config.is_input() {
                self.write_value |= mask;
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
                self.write_value |= mask;
            }
        }

        debug!(%address, value = %Self::hex(self.write_value), "Setting initial value");
        if self.send_current_value(ctx) {
            for pin in defaults {
                ctx.acknowledge(&StateId::pin(address, pin), self.pins[pin].is_inverted());
            }
        }

        self.read_current_value(ctx, true);

        if self.has_inputs() {
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
    use crate::adapter::AdapterEvent;
    use crate::handler::Lifecycle;
    use crate::testing::Fixture;
    use pinbridge_core::BusAddress;
    use pinbridge_hardware::mock::BusOp;
    use rstest::rstest;
    use std::time::Duration;

    fn addr() -> BusAddress {
        BusAddress::new(0x20).unwrap()
    }

    fn mixed_config() -> DeviceConfig {
        let outputs = [PinConfig::output(); 4];
        let inputs = [PinConfig::input(); 4];
        DeviceConfig::new(0x20, "PCF8574").with_pins(outputs.into_iter().chain(inputs))
    }

    fn outputs_only() -> DeviceConfig {
        DeviceConfig::new(0x20, "PCF8574").with_pins([PinConfig::output(); 8])
    }

    fn reads(fixture: &Fixture) -> usize {
        fixture
            .bus_handle
            .count(|op| matches!(op, BusOp::ReadByte { .. }))
    }

    fn byte_writes(fixture: &Fixture) -> Vec<u8> {
        fixture
            .bus_handle
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::WriteByte { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    fn started(config: DeviceConfig, fixture: &mut Fixture) -> Pcf8574 {
        let mut handler = Pcf8574::new(config).unwrap();
        handler.start(&mut fixture.context()).unwrap();
        fixture.bus_handle.clear_operations();
        fixture.store.clear_writes();
        handler
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_mixed_pins() {
        let mut fixture = Fixture::new();
        fixture.bus_handle.set_byte_default(addr(), 0xF0);

        let config = mixed_config().with_polling_interval(200);
        let mut handler = Pcf8574::new(config).unwrap();
        handler.start(&mut fixture.context()).unwrap();

        assert_eq!(handler.lifecycle(), Lifecycle::Started);
        assert_eq!(handler.write_value(), 0xF0);
        // initial write, then one forced read with its release write
        assert_eq!(byte_writes(&fixture), vec![0xF0, 0xF0]);
        assert_eq!(reads(&fixture), 1);
        assert_eq!(handler.base().poll_period(), Some(Duration::from_millis(200)));

        for pin in 0..4 {
            let state = fixture.store.state(&format!("i2c.0.0x20.{pin}")).unwrap();
            assert_eq!(state.value, StateValue::Bool(false));
            assert!(state.ack);
        }
        for pin in 4..8 {
            let state = fixture.store.state(&format!("i2c.0.0x20.{pin}")).unwrap();
            assert_eq!(state.value, StateValue::Bool(true));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timer_posts_poll_events() {
        let mut fixture = Fixture::new();
        let _handler = started(mixed_config().with_polling_interval(200), &mut fixture);

        tokio::time::sleep(Duration::from_millis(210)).await;
        assert!(matches!(
            fixture.events.try_recv(),
            Ok(AdapterEvent::Poll(address)) if address == addr()
        ));
    }

    #[test]
    fn test_start_restores_cached_outputs() {
        let mut fixture = Fixture::new();
        fixture.store.seed("i2c.0.0x20.1", true, true);
        fixture.store.seed("i2c.0.0x20.3", 1.0, true);
        fixture.state.seed().unwrap();

        let mut handler = Pcf8574::new(outputs_only()).unwrap();
        handler.start(&mut fixture.context()).unwrap();

        assert_eq!(handler.write_value(), 0b0000_1010);
        // cached pins are not republished
        assert!(fixture.store.writes_to("i2c.0.0x20.1").is_empty());
        assert_eq!(fixture.store.writes_to("i2c.0.0x20.0").len(), 1);
    }

    #[test]
    fn test_outputs_only_device_never_polls() {
        let mut fixture = Fixture::new();
        let config = outputs_only().with_polling_interval(100);
        let mut handler = Pcf8574::new(config).unwrap();

        handler.start(&mut fixture.context()).unwrap();
        assert_eq!(handler.base().poll_period(), None);
    }

    #[test]
    fn test_unchanged_output_is_not_written() {
        let mut fixture = Fixture::new();
        let mut handler = started(outputs_only(), &mut fixture);

        handler.change_output(&mut fixture.context(), 2, true).unwrap();
        handler.change_output(&mut fixture.context(), 2, true).unwrap();

        assert_eq!(byte_writes(&fixture), vec![0b0000_0100]);
        assert_eq!(fixture.store.writes_to("i2c.0.0x20.2").len(), 1);
    }

    #[test]
    fn test_failed_write_restores_image() {
        let mut fixture = Fixture::new();
        let mut handler = started(outputs_only(), &mut fixture);
        fixture.bus_handle.fail_next_writes(1);

        handler.change_output(&mut fixture.context(), 0, true).unwrap();

        assert_eq!(handler.write_value(), 0);
        assert!(fixture.store.writes().is_empty());

        // the retry is a real change again
        handler.change_output(&mut fixture.context(), 0, true).unwrap();
        assert_eq!(handler.write_value(), 1);
    }

    #[rstest]
    #[case(false, true, 0b0000_0001)]
    #[case(false, false, 0b0000_0000)]
    #[case(true, true, 0b0000_0000)]
    #[case(true, false, 0b0000_0001)]
    fn test_output_inversion(#[case] inverted: bool, #[case] value: bool, #[case] image: u8) {
        let mut fixture = Fixture::new();
        let config = DeviceConfig::new(0x20, "PCF8574")
            .with_pins([PinConfig::output().with_inverted(inverted)]);
        let mut handler = started(config, &mut fixture);

        handler
            .change_output(&mut fixture.context(), 0, !value)
            .unwrap();
        handler.change_output(&mut fixture.context(), 0, value).unwrap();

        assert_eq!(handler.write_value() & 1, image);
        let state = fixture.store.state("i2c.0.0x20.0").unwrap();
        assert_eq!(state.value, StateValue::Bool(value));
    }

    #[rstest]
    #[case(false, 0x01, true)]
    #[case(false, 0x00, false)]
    #[case(true, 0x01, false)]
    #[case(true, 0x00, true)]
    fn test_input_inversion(#[case] inverted: bool, #[case] level: u8, #[case] expected: bool) {
        let mut fixture = Fixture::new();
        fixture.bus_handle.set_byte_default(addr(), level);
        let config = DeviceConfig::new(0x20, "PCF8574")
            .with_pins([PinConfig::input().with_inverted(inverted)]);
        let mut handler = Pcf8574::new(config).unwrap();

        handler.start(&mut fixture.context()).unwrap();

        let state = fixture.store.state("i2c.0.0x20.0").unwrap();
        assert_eq!(state.value, StateValue::Bool(expected));
    }

    #[test]
    fn test_glitch_read_is_retried() {
        let mut fixture = Fixture::new();
        let mut handler = started(mixed_config(), &mut fixture);
        fixture.bus_handle.queue_byte_reads(addr(), [0xFF, 0xFF, 0x10]);

        handler.read_current_value(&mut fixture.context(), false);

        assert_eq!(reads(&fixture), 3);
        assert_eq!(handler.read_value(), 0x10);
    }

    #[test]
    fn test_glitch_accepted_after_last_attempt() {
        let mut fixture = Fixture::new();
        let mut handler = started(mixed_config(), &mut fixture);
        fixture.bus_handle.set_byte_default(addr(), 0xFF);

        handler.read_current_value(&mut fixture.context(), false);

        assert_eq!(reads(&fixture), GLITCH_READ_ATTEMPTS);
        assert_eq!(handler.read_value(), 0xFF);
    }

    #[test]
    fn test_forced_read_accepts_all_ones() {
        let mut fixture = Fixture::new();
        let mut handler = started(mixed_config(), &mut fixture);
        fixture.bus_handle.queue_byte_reads(addr(), [0xFF, 0x10]);

        handler.read_current_value(&mut fixture.context(), true);

        assert_eq!(reads(&fixture), 1);
        assert_eq!(handler.read_value(), 0xFF);
    }

    #[test]
    fn test_every_read_is_preceded_by_image_write() {
        let mut fixture = Fixture::new();
        let mut handler = started(mixed_config(), &mut fixture);
        fixture.bus_handle.queue_byte_reads(addr(), [0xFF, 0x30]);

        handler.read_current_value(&mut fixture.context(), false);

        let ops = fixture.bus_handle.operations();
        assert_eq!(ops.len(), 4);
        for pair in ops.chunks(2) {
            assert_eq!(
                pair[0],
                BusOp::WriteByte {
                    address: addr(),
                    value: 0xF0
                }
            );
            assert_eq!(pair[1], BusOp::ReadByte { address: addr() });
        }
    }

    #[test]
    fn test_unchanged_read_publishes_nothing() {
        let mut fixture = Fixture::new();
        fixture.bus_handle.set_byte_default(addr(), 0x30);
        let mut handler = started(mixed_config(), &mut fixture);

        handler.read_current_value(&mut fixture.context(), false);
        assert!(fixture.store.writes().is_empty());

        handler.read_current_value(&mut fixture.context(), true);
        assert_eq!(fixture.store.writes().len(), 4);
    }

    #[test]
    fn test_only_changed_inputs_published() {
        let mut fixture = Fixture::new();
        fixture.bus_handle.set_byte_default(addr(), 0x30);
        let mut handler = started(mixed_config(), &mut fixture);
        fixture.bus_handle.set_byte_default(addr(), 0x20);

        handler.read_current_value(&mut fixture.context(), false);

        let writes = fixture.store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].id, "i2c.0.0x20.4");
        assert_eq!(writes[0].value, StateValue::Bool(false));
    }

    #[test]
    fn test_read_failure_keeps_last_value() {
        let mut fixture = Fixture::new();
        fixture.bus_handle.set_byte_default(addr(), 0x30);
        let mut handler = started(mixed_config(), &mut fixture);
        fixture.bus_handle.fail_next_reads(1);

        handler.read_current_value(&mut fixture.context(), false);

        assert_eq!(handler.read_value(), 0x30);
        assert!(fixture.store.writes().is_empty());
    }

    #[test]
    fn test_write_to_input_pin_is_rejected() {
        let mut fixture = Fixture::new();
        let mut handler = started(mixed_config(), &mut fixture);

        let result = handler.change_output(&mut fixture.context(), 5, true);
        assert!(matches!(result, Err(AdapterError::InvalidPin { pin: 5, .. })));
        assert!(fixture.bus_handle.operations().is_empty());
    }

    #[test]
    fn test_stop_without_start() {
        let mut fixture = Fixture::new();
        let mut handler = Pcf8574::new(mixed_config()).unwrap();

        handler.stop(&mut fixture.context()).unwrap();

        assert_eq!(handler.lifecycle(), Lifecycle::Stopped);
        assert!(fixture.bus_handle.operations().is_empty());
        assert!(handler.start(&mut fixture.context()).is_err());
    }

    #[test]
    fn test_start_with_unavailable_store_fails_before_bus_traffic() {
        let mut fixture = Fixture::new();
        fixture.store.set_unavailable(true);
        let mut handler = Pcf8574::new(mixed_config()).unwrap();

        assert!(handler.start(&mut fixture.context()).is_err());
        assert_eq!(handler.lifecycle(), Lifecycle::Created);
        assert!(fixture.bus_handle.operations().is_empty());
    }

    #[test]
    fn test_failed_interrupt_subscription_still_starts() {
        let mut fixture = Fixture::new();
        fixture.store.add_foreign_object("gpio.0.irq");
        fixture.store.reject_subscriptions(true);
        let mut handler = Pcf8574::new(mixed_config().with_interrupt("gpio.0.irq")).unwrap();

        handler.start(&mut fixture.context()).unwrap();

        assert_eq!(handler.lifecycle(), Lifecycle::Started);
        assert_eq!(handler.base().interrupt(), None);
        assert!(!fixture.store.is_subscribed("gpio.0.irq"));
    }
}
