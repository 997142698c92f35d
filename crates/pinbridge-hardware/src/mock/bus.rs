//! Mock bus implementation for testing and development.
//!
//! The mock keeps a shared register file per device and a log of every
//! transaction, so tests can script what a chip returns and then assert on
//! exactly which transfers a handler issued, and in which order.

use crate::{
    BusError, Result,
    traits::{BoxedTransport, BusOpener, BusTransport, check_block_len},
};
use pinbridge_core::BusAddress;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One transaction observed by a [`MockBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BusOp {
    /// Single byte sent.
    WriteByte { address: BusAddress, value: u8 },

    /// Single byte received.
    ReadByte { address: BusAddress },

    /// Word written to a register.
    WriteWord {
        address: BusAddress,
        command: u8,
        value: u16,
    },

    /// Word read from a register.
    ReadWord { address: BusAddress, command: u8 },

    /// Block written to a register.
    WriteBlock {
        address: BusAddress,
        command: u8,
        data: Vec<u8>,
    },

    /// Block read from a register.
    ReadBlock {
        address: BusAddress,
        command: u8,
        len: usize,
    },

    /// Plain write.
    Write { address: BusAddress, data: Vec<u8> },

    /// Plain read.
    Read { address: BusAddress, len: usize },

    /// Bus scan.
    Scan,

    /// Transport closed.
    Close,
}

impl BusOp {
    /// Address targeted by this transaction, if any.
    pub fn address(&self) -> Option<BusAddress> {
        match self {
            Self::WriteByte { address, .. }
            | Self::ReadByte { address }
            | Self::WriteWord { address, .. }
            | Self::ReadWord { address, .. }
            | Self::WriteBlock { address, .. }
            | Self::ReadBlock { address, .. }
            | Self::Write { address, .. }
            | Self::Read { address, .. } => Some(*address),
            Self::Scan | Self::Close => None,
        }
    }

    /// Check if this transaction reads from a device.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ReadByte { .. } | Self::ReadWord { .. } | Self::ReadBlock { .. } | Self::Read { .. }
        )
    }

    /// Check if this transaction writes to a device.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::WriteByte { .. }
                | Self::WriteWord { .. }
                | Self::WriteBlock { .. }
                | Self::Write { .. }
        )
    }
}

#[derive(Debug, Default)]
struct MockBusState {
    /// Addresses reported by scan.
    present: BTreeSet<BusAddress>,

    /// Addresses that do not acknowledge.
    offline: HashSet<BusAddress>,

    /// Scripted byte reads, consumed front to back.
    byte_queue: HashMap<BusAddress, VecDeque<u8>>,

    /// Byte returned once the queue for an address is empty.
    byte_default: HashMap<BusAddress, u8>,

    /// Word registers, stored in host order.
    words: HashMap<(BusAddress, u8), u16>,

    /// Block registers.
    blocks: HashMap<(BusAddress, u8), Vec<u8>>,

    /// Data returned by plain reads.
    raw: HashMap<BusAddress, Vec<u8>>,

    /// Number of upcoming reads that fail.
    fail_reads: usize,

    /// Number of upcoming writes that fail.
    fail_writes: usize,

    /// Transaction log.
    ops: Vec<BusOp>,

    /// Make `close` report a failure.
    fail_close: bool,

    closed: bool,
}

impl MockBusState {
    fn check_read(&mut self, address: BusAddress) -> Result<()> {
        self.check_link(address)?;
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(BusError::communication("injected read failure"));
        }
        Ok(())
    }

    fn check_write(&mut self, address: BusAddress) -> Result<()> {
        self.check_link(address)?;
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(BusError::communication("injected write failure"));
        }
        Ok(())
    }

    fn check_link(&self, address: BusAddress) -> Result<()> {
        if self.closed {
            return Err(BusError::Closed);
        }
        if self.offline.contains(&address) {
            return Err(BusError::nack(address));
        }
        Ok(())
    }

    fn fill(source: Option<&Vec<u8>>, buffer: &mut [u8]) {
        buffer.fill(0);
        if let Some(data) = source {
            let len = data.len().min(buffer.len());
            buffer[..len].copy_from_slice(&data[..len]);
        }
    }
}

fn lock(state: &Mutex<MockBusState>) -> MutexGuard<'_, MockBusState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock bus for testing and development.
///
/// All addresses acknowledge unless marked offline; unscripted byte reads
/// return 0x00 and unwritten word registers read as 0x0000. Every
/// transaction, failed or not, is appended to the log.
///
/// # Examples
///
/// ```
/// use pinbridge_core::BusAddress;
/// use pinbridge_hardware::mock::{BusOp, MockBus};
/// use pinbridge_hardware::traits::BusTransport;
///
/// let (mut bus, handle) = MockBus::new();
/// let address = BusAddress::new(0x20).unwrap();
///
/// bus.write_byte(address, 0xF0).unwrap();
///
/// assert_eq!(
///     handle.operations(),
///     vec![BusOp::WriteByte { address, value: 0xF0 }]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockBusState>>,
}

impl MockBus {
    /// Create a new mock bus.
    ///
    /// Returns a tuple of (MockBus, MockBusHandle) where the handle scripts
    /// device responses and inspects the transaction log.
    pub fn new() -> (Self, MockBusHandle) {
        let state = Arc::new(Mutex::new(MockBusState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockBusHandle { state },
        )
    }

    fn state(&self) -> MutexGuard<'_, MockBusState> {
        lock(&self.state)
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new().0
    }
}

impl BusTransport for MockBus {
    fn read_byte(&mut self, address: BusAddress) -> Result<u8> {
        let mut state = self.state();
        state.ops.push(BusOp::ReadByte { address });
        state.check_read(address)?;

        let scripted = state
            .byte_queue
            .get_mut(&address)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| state.byte_default.get(&address).copied().unwrap_or(0)))
    }

    fn write_byte(&mut self, address: BusAddress, value: u8) -> Result<()> {
        let mut state = self.state();
        state.ops.push(BusOp::WriteByte { address, value });
        state.check_write(address)
    }

    fn read_word(&mut self, address: BusAddress, command: u8) -> Result<u16> {
        let mut state = self.state();
        state.ops.push(BusOp::ReadWord { address, command });
        state.check_read(address)?;
        Ok(state.words.get(&(address, command)).copied().unwrap_or(0))
    }

    fn write_word(&mut self, address: BusAddress, command: u8, value: u16) -> Result<()> {
        let mut state = self.state();
        state.ops.push(BusOp::WriteWord {
            address,
            command,
            value,
        });
        state.check_write(address)?;
        state.words.insert((address, command), value);
        Ok(())
    }

    fn read_block(
        &mut self,
        address: BusAddress,
        command: u8,
        buffer: &mut [u8],
    ) -> Result<usize> {
        check_block_len(buffer.len())?;
        let mut state = self.state();
        state.ops.push(BusOp::ReadBlock {
            address,
            command,
            len: buffer.len(),
        });
        state.check_read(address)?;
        MockBusState::fill(state.blocks.get(&(address, command)), buffer);
        Ok(buffer.len())
    }

    fn write_block(&mut self, address: BusAddress, command: u8, data: &[u8]) -> Result<()> {
        check_block_len(data.len())?;
        let mut state = self.state();
        state.ops.push(BusOp::WriteBlock {
            address,
            command,
            data: data.to_vec(),
        });
        state.check_write(address)?;
        state.blocks.insert((address, command), data.to_vec());
        Ok(())
    }

    fn read(&mut self, address: BusAddress, buffer: &mut [u8]) -> Result<usize> {
        let mut state = self.state();
        state.ops.push(BusOp::Read {
            address,
            len: buffer.len(),
        });
        state.check_read(address)?;
        MockBusState::fill(state.raw.get(&address), buffer);
        Ok(buffer.len())
    }

    fn write(&mut self, address: BusAddress, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        state.ops.push(BusOp::Write {
            address,
            data: data.to_vec(),
        });
        state.check_write(address)?;
        state.raw.insert(address, data.to_vec());
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<BusAddress>> {
        let mut state = self.state();
        state.ops.push(BusOp::Scan);
        if state.closed {
            return Err(BusError::Closed);
        }
        Ok(state
            .present
            .iter()
            .filter(|address| !state.offline.contains(*address))
            .copied()
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.ops.push(BusOp::Close);
        state.closed = true;
        if state.fail_close {
            return Err(BusError::communication("injected close failure"));
        }
        Ok(())
    }
}

/// Handle for scripting and inspecting a mock bus.
///
/// The handle shares state with every [`MockBus`] created from it and can be
/// cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockBusHandle {
    state: Arc<Mutex<MockBusState>>,
}

impl MockBusHandle {
    fn state(&self) -> MutexGuard<'_, MockBusState> {
        lock(&self.state)
    }

    /// Create another transport on the same simulated bus.
    pub fn bus(&self) -> MockBus {
        MockBus {
            state: Arc::clone(&self.state),
        }
    }

    /// Make `address` respond to scans.
    pub fn add_device(&self, address: BusAddress) {
        self.state().present.insert(address);
    }

    /// Make `address` stop (or resume) acknowledging transfers.
    pub fn set_offline(&self, address: BusAddress, offline: bool) {
        let mut state = self.state();
        if offline {
            state.offline.insert(address);
        } else {
            state.offline.remove(&address);
        }
    }

    /// Script the next byte reads from `address`.
    pub fn queue_byte_reads(&self, address: BusAddress, values: impl IntoIterator<Item = u8>) {
        self.state()
            .byte_queue
            .entry(address)
            .or_default()
            .extend(values);
    }

    /// Set the byte returned once the scripted reads are used up.
    pub fn set_byte_default(&self, address: BusAddress, value: u8) {
        self.state().byte_default.insert(address, value);
    }

    /// Set a word register (host order).
    pub fn set_word(&self, address: BusAddress, command: u8, value: u16) {
        self.state().words.insert((address, command), value);
    }

    /// Current content of a word register (host order).
    pub fn word(&self, address: BusAddress, command: u8) -> Option<u16> {
        self.state().words.get(&(address, command)).copied()
    }

    /// Set the content of a block register.
    pub fn set_block(&self, address: BusAddress, command: u8, data: impl Into<Vec<u8>>) {
        self.state().blocks.insert((address, command), data.into());
    }

    /// Set the data returned by plain reads from `address`.
    pub fn set_raw(&self, address: BusAddress, data: impl Into<Vec<u8>>) {
        self.state().raw.insert(address, data.into());
    }

    /// Fail the next `count` read transactions.
    pub fn fail_next_reads(&self, count: usize) {
        self.state().fail_reads = count;
    }

    /// Fail the next `count` write transactions.
    pub fn fail_next_writes(&self, count: usize) {
        self.state().fail_writes = count;
    }

    /// Make closing the bus fail. The bus still ends up closed.
    pub fn fail_close(&self, fail: bool) {
        self.state().fail_close = fail;
    }

    /// Snapshot of the transaction log.
    pub fn operations(&self) -> Vec<BusOp> {
        self.state().ops.clone()
    }

    /// Number of logged transactions matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&BusOp) -> bool) -> usize {
        self.state().ops.iter().filter(|op| predicate(op)).count()
    }

    /// Forget all logged transactions.
    pub fn clear_operations(&self) {
        self.state().ops.clear();
    }

    /// Check if the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

/// Opens mock buses by number.
///
/// # Examples
///
/// ```
/// use pinbridge_hardware::mock::{MockBus, MockBusOpener};
/// use pinbridge_hardware::traits::BusOpener;
///
/// let (_bus, handle) = MockBus::new();
/// let opener = MockBusOpener::new().with_bus(1, handle);
///
/// assert!(opener.open(1).is_ok());
/// assert!(opener.open(2).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBusOpener {
    buses: HashMap<u32, MockBusHandle>,
}

impl MockBusOpener {
    /// Create an opener without buses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make bus `number` available.
    pub fn with_bus(mut self, number: u32, handle: MockBusHandle) -> Self {
        self.buses.insert(number, handle);
        self
    }
}

impl BusOpener for MockBusOpener {
    fn open(&self, bus_number: u32) -> Result<BoxedTransport> {
        let handle = self
            .buses
            .get(&bus_number)
            .ok_or(BusError::NoSuchBus { bus: bus_number })?;
        let mut state = handle.state();
        state.closed = false;
        drop(state);
        Ok(Box::new(handle.bus()))
    }
}
