//! Shared rig for adapter integration tests.

#![allow(dead_code)]

use pinbridge_adapter::Adapter;
use pinbridge_adapter::AdapterHandle;
use pinbridge_adapter::mock::{MemoryStore, MemoryStoreHandle};
use pinbridge_core::{AdapterConfig, BusAddress, DeviceConfig, PinConfig};
use pinbridge_hardware::mock::{BusOp, MockBus, MockBusHandle, MockBusOpener};

pub const MAIN_BUS: u32 = 1;
pub const SECONDARY_BUS: u32 = 2;

pub fn addr(raw: u8) -> BusAddress {
    BusAddress::new(raw).unwrap()
}

/// Byte expander with pins 0..=3 as outputs and 4..=7 as inputs.
pub fn mixed_pcf8574(address: u8) -> DeviceConfig {
    let outputs = [PinConfig::output(); 4];
    let inputs = [PinConfig::input(); 4];
    DeviceConfig::new(address, "PCF8574").with_pins(outputs.into_iter().chain(inputs))
}

pub fn config(devices: impl IntoIterator<Item = DeviceConfig>) -> AdapterConfig {
    AdapterConfig {
        bus_number: MAIN_BUS,
        devices: devices.into_iter().collect(),
        ..AdapterConfig::default()
    }
}

pub struct Rig {
    pub adapter: Adapter,
    pub handle: AdapterHandle,
    pub bus: MockBusHandle,
    pub secondary: MockBusHandle,
    pub store: MemoryStoreHandle,
}

impl Rig {
    pub fn new(config: AdapterConfig) -> Self {
        let (_, store) = MemoryStore::new();
        Self::with_store(config, store)
    }

    /// Build the adapter over a store prepared by the caller.
    pub fn with_store(config: AdapterConfig, store: MemoryStoreHandle) -> Self {
        let (_, bus) = MockBus::new();
        let (_, secondary) = MockBus::new();
        let opener = MockBusOpener::new()
            .with_bus(MAIN_BUS, bus.clone())
            .with_bus(SECONDARY_BUS, secondary.clone());
        let (adapter, handle) = Adapter::new(config, Box::new(store.store()), opener).unwrap();
        Self {
            adapter,
            handle,
            bus,
            secondary,
            store,
        }
    }

    pub fn reads(&self) -> usize {
        self.bus
            .count(|op| matches!(op, BusOp::ReadByte { .. } | BusOp::ReadWord { .. }))
    }

    pub fn byte_writes(&self) -> Vec<u8> {
        self.bus
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::WriteByte { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }
}
