//! Performance benchmarks for the device handler read and write cycles.
//!
//! Every cycle runs through the adapter event loop against the mock bus, so
//! the numbers cover routing, debounce and acknowledgment bookkeeping on top
//! of the handler itself.
//!
//! # Run Benchmarks
//!
//! ```sh
//! # Run all handler benchmarks
//! cargo bench --bench handler_bench
//!
//! # Run one group
//! cargo bench --bench handler_bench -- poll_cycle
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pinbridge_adapter::devices::swap_word;
use pinbridge_adapter::mock::MemoryStore;
use pinbridge_adapter::{Adapter, AdapterEvent, StateChange};
use pinbridge_core::{AdapterConfig, BusAddress, DeviceConfig, PinConfig};
use pinbridge_hardware::mock::{MockBus, MockBusHandle, MockBusOpener};
use std::hint::black_box;

fn running_adapter(device: DeviceConfig) -> (Adapter, MockBusHandle) {
    let (_, bus) = MockBus::new();
    let (store, _) = MemoryStore::new();
    let config = AdapterConfig {
        bus_number: 1,
        devices: vec![device],
        ..AdapterConfig::default()
    };
    let opener = MockBusOpener::new().with_bus(1, bus.clone());
    let (mut adapter, _handle) = Adapter::new(config, Box::new(store), opener).unwrap();
    adapter.start().unwrap();
    (adapter, bus)
}

fn mixed_pcf8574() -> DeviceConfig {
    let outputs = [PinConfig::output(); 4];
    let inputs = [PinConfig::input(); 4];
    DeviceConfig::new(0x20, "PCF8574").with_pins(outputs.into_iter().chain(inputs))
}

/// Poll cycle of the byte expander: unchanged input, changing input, and a
/// glitching chip that needs every retry.
fn bench_poll_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll_cycle");
    group.throughput(Throughput::Elements(1));
    let address = BusAddress::new(0x20).unwrap();

    let (mut adapter, bus) = running_adapter(mixed_pcf8574());
    group.bench_function("unchanged", |b| {
        b.iter(|| {
            bus.clear_operations();
            black_box(adapter.process(AdapterEvent::Poll(black_box(address))))
        });
    });

    let (mut adapter, bus) = running_adapter(mixed_pcf8574());
    group.bench_function("changed", |b| {
        let mut level = 0u8;
        b.iter(|| {
            level ^= 0x10;
            bus.clear_operations();
            bus.queue_byte_reads(address, [level]);
            black_box(adapter.process(AdapterEvent::Poll(black_box(address))))
        });
    });

    let (mut adapter, bus) = running_adapter(mixed_pcf8574());
    bus.set_byte_default(address, 0xFF);
    group.bench_function("glitch_retries", |b| {
        b.iter(|| {
            bus.clear_operations();
            black_box(adapter.process(AdapterEvent::Poll(black_box(address))))
        });
    });

    group.finish();
}

/// Write requests: a real image change versus a debounced repeat.
fn bench_write_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_request");
    group.throughput(Throughput::Elements(1));

    for (name, toggle) in [("toggling", true), ("debounced", false)] {
        let (mut adapter, bus) = running_adapter(mixed_pcf8574());
        group.bench_with_input(BenchmarkId::new("pcf8574", name), &toggle, |b, &toggle| {
            let mut value = true;
            b.iter(|| {
                if toggle {
                    value = !value;
                }
                bus.clear_operations();
                let change = StateChange::command("i2c.0.0x20.0", value);
                black_box(adapter.process(AdapterEvent::StateChange(change)))
            });
        });
    }

    group.finish();
}

fn bench_swap_word(c: &mut Criterion) {
    c.bench_function("swap_word", |b| {
        b.iter(|| swap_word(black_box(0x1234)));
    });
}

criterion_group!(benches, bench_poll_cycle, bench_write_request, bench_swap_word);
criterion_main!(benches);
