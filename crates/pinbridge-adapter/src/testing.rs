//! Shared fixture for handler unit tests.

use crate::adapter::AdapterEvent;
use crate::handler::HandlerContext;
use crate::mock::{MemoryStore, MemoryStoreHandle};
use crate::sync::StateSync;
use pinbridge_hardware::mock::{MockBus, MockBusHandle};
use tokio::sync::mpsc;

pub(crate) struct Fixture {
    pub bus: MockBus,
    pub bus_handle: MockBusHandle,
    pub state: StateSync,
    pub store: MemoryStoreHandle,
    pub sender: mpsc::Sender<AdapterEvent>,
    pub events: mpsc::Receiver<AdapterEvent>,
}

impl Fixture {
    pub fn new() -> Self {
        let (bus, bus_handle) = MockBus::new();
        let (store, store_handle) = MemoryStore::new();
        let (sender, events) = mpsc::channel(16);
        Self {
            bus,
            bus_handle,
            state: StateSync::new("i2c.0", Box::new(store)),
            store: store_handle,
            sender,
            events,
        }
    }

    pub fn context(&mut self) -> HandlerContext<'_> {
        HandlerContext::new(&mut self.bus, &mut self.state, &self.sender)
    }
}
