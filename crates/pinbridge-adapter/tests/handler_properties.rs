//! Property tests for handler bus discipline.

mod common;

use common::{Rig, addr, config, mixed_pcf8574};
use pinbridge_adapter::devices::swap_word;
use pinbridge_adapter::{AdapterEvent, StateChange};
use pinbridge_core::constants::MCP23017_OLAT;
use pinbridge_core::{DeviceConfig, PinConfig};
use pinbridge_hardware::mock::BusOp;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_only_image_changes_reach_the_bus(
        requests in prop::collection::vec((0usize..4, any::<bool>()), 1..40)
    ) {
        let mut rig = Rig::new(config([mixed_pcf8574(0x20)]));
        rig.adapter.start().unwrap();
        rig.bus.clear_operations();

        let mut image = 0xF0u8;
        let mut expected = Vec::new();
        for (pin, value) in &requests {
            let next = if *value { image | 1 << pin } else { image & !(1 << pin) };
            if next != image {
                expected.push(next);
                image = next;
            }
            let id = format!("i2c.0.0x20.{pin}");
            rig.adapter
                .process(AdapterEvent::StateChange(StateChange::command(id, *value)))
                .unwrap();
        }

        prop_assert_eq!(rig.byte_writes(), expected);
    }

    #[test]
    fn prop_inverted_outputs_round_trip(
        inverted in prop::array::uniform4(any::<bool>()),
        values in prop::array::uniform4(any::<bool>()),
    ) {
        let pins = inverted.map(|inv| PinConfig::output().with_inverted(inv));
        let mut rig = Rig::new(config([DeviceConfig::new(0x20, "PCF8574").with_pins(pins)]));
        rig.adapter.start().unwrap();

        for (pin, value) in values.iter().enumerate() {
            let id = format!("i2c.0.0x20.{pin}");
            rig.adapter
                .process(AdapterEvent::StateChange(StateChange::command(id.clone(), *value)))
                .unwrap();
            let stored = rig.store.state(&id).unwrap();
            prop_assert_eq!(stored.value.as_bool(), *value);
        }

        let image = rig.byte_writes().last().copied().unwrap();
        for pin in 0..4 {
            let level = image & (1 << pin) != 0;
            prop_assert_eq!(level, values[pin] != inverted[pin]);
        }
    }

    #[test]
    fn prop_word_outputs_are_big_endian(levels: u16) {
        let mut rig = Rig::new(config([
            DeviceConfig::new(0x20, "MCP23017").with_pins([PinConfig::output(); 16]),
        ]));
        rig.adapter.start().unwrap();
        rig.bus.clear_operations();

        for pin in 0..16 {
            let bit = if pin < 8 { pin + 8 } else { pin - 8 };
            let id = format!("i2c.0.0x20.{pin}");
            rig.adapter
                .process(AdapterEvent::StateChange(StateChange::command(id, levels & (1 << bit) != 0)))
                .unwrap();
        }

        let latch = rig.bus.word(addr(0x20), MCP23017_OLAT).unwrap_or(0);
        prop_assert_eq!(swap_word(latch), levels);
        let all_olat_writes = rig.bus.operations().iter().all(|op| matches!(op, BusOp::WriteWord { command: MCP23017_OLAT, .. }));
        prop_assert!(all_olat_writes);
    }
}
