//! In-memory state store.
//!
//! Keeps objects, values and foreign subscriptions in a shared map and logs
//! every `set_state` call, so tests can assert on what the adapter published
//! and in which order.

use crate::store::{ObjectDeclaration, StateStore, StoreError, StoreResult};
use pinbridge_core::StateValue;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Value stored for one id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredState {
    pub value: StateValue,
    pub ack: bool,
}

/// One `set_state` call observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    pub id: String,
    pub value: StateValue,
    pub ack: bool,
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    states: BTreeMap<String, StoredState>,
    objects: BTreeMap<String, ObjectDeclaration>,

    /// Objects owned by other adapters.
    foreign: BTreeSet<String>,

    subscriptions: BTreeSet<String>,
    writes: Vec<StateWrite>,
    unavailable: bool,

    /// Make `subscribe_foreign` fail while everything else works.
    reject_subscriptions: bool,
}

impl MemoryStoreState {
    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::unavailable("memory store switched off"));
        }
        Ok(())
    }
}

fn lock(state: &Mutex<MemoryStoreState>) -> MutexGuard<'_, MemoryStoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`StateStore`].
///
/// # Examples
///
/// ```
/// use pinbridge_adapter::mock::MemoryStore;
/// use pinbridge_adapter::store::StateStore;
///
/// let (mut store, handle) = MemoryStore::new();
/// store.set_state("i2c.0.0x20.0", true.into(), true).unwrap();
///
/// assert_eq!(handle.writes().len(), 1);
/// assert!(handle.state("i2c.0.0x20.0").unwrap().ack);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryStoreState>>,
}

impl MemoryStore {
    /// Create an empty store.
    ///
    /// Returns a tuple of (MemoryStore, MemoryStoreHandle) where the handle
    /// seeds values and inspects what was written.
    pub fn new() -> (Self, MemoryStoreHandle) {
        let state = Arc::new(Mutex::new(MemoryStoreState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MemoryStoreHandle { state },
        )
    }

    fn inner(&self) -> MutexGuard<'_, MemoryStoreState> {
        lock(&self.state)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new().0
    }
}

impl StateStore for MemoryStore {
    fn set_state(&mut self, id: &str, value: StateValue, ack: bool) -> StoreResult<()> {
        let mut state = self.inner();
        state.check_available()?;
        state.writes.push(StateWrite {
            id: id.to_string(),
            value,
            ack,
        });
        state.states.insert(id.to_string(), StoredState { value, ack });
        Ok(())
    }

    fn extend_object(&mut self, id: &str, object: ObjectDeclaration) -> StoreResult<()> {
        let mut state = self.inner();
        state.check_available()?;
        state.objects.insert(id.to_string(), object);
        Ok(())
    }

    fn acknowledged_states(&self) -> StoreResult<Vec<(String, StateValue)>> {
        let state = self.inner();
        state.check_available()?;
        Ok(state
            .states
            .iter()
            .filter(|(_, stored)| stored.ack)
            .map(|(id, stored)| (id.clone(), stored.value))
            .collect())
    }

    fn object_exists(&self, id: &str) -> StoreResult<bool> {
        let state = self.inner();
        state.check_available()?;
        Ok(state.foreign.contains(id) || state.objects.contains_key(id))
    }

    fn subscribe_foreign(&mut self, id: &str) -> StoreResult<()> {
        let mut state = self.inner();
        state.check_available()?;
        if state.reject_subscriptions {
            return Err(StoreError::unavailable("subscriptions rejected"));
        }
        state.subscriptions.insert(id.to_string());
        Ok(())
    }

    fn unsubscribe_foreign(&mut self, id: &str) -> StoreResult<()> {
        let mut state = self.inner();
        state.check_available()?;
        state.subscriptions.remove(id);
        Ok(())
    }
}

/// Handle for seeding and inspecting a memory store.
#[derive(Debug, Clone)]
pub struct MemoryStoreHandle {
    state: Arc<Mutex<MemoryStoreState>>,
}

impl MemoryStoreHandle {
    fn inner(&self) -> MutexGuard<'_, MemoryStoreState> {
        lock(&self.state)
    }

    /// Create another store view over the same data.
    pub fn store(&self) -> MemoryStore {
        MemoryStore {
            state: Arc::clone(&self.state),
        }
    }

    /// Seed a value without logging it as a write.
    pub fn seed(&self, id: impl Into<String>, value: impl Into<StateValue>, ack: bool) {
        self.inner().states.insert(
            id.into(),
            StoredState {
                value: value.into(),
                ack,
            },
        );
    }

    /// Register an object owned by another adapter.
    pub fn add_foreign_object(&self, id: impl Into<String>) {
        self.inner().foreign.insert(id.into());
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner().unavailable = unavailable;
    }

    /// Make foreign subscriptions fail while other calls succeed.
    pub fn reject_subscriptions(&self, reject: bool) {
        self.inner().reject_subscriptions = reject;
    }

    /// Current value of `id`.
    pub fn state(&self, id: &str) -> Option<StoredState> {
        self.inner().states.get(id).copied()
    }

    /// Declared metadata of `id`.
    pub fn object(&self, id: &str) -> Option<ObjectDeclaration> {
        self.inner().objects.get(id).cloned()
    }

    /// Number of declared objects.
    pub fn object_count(&self) -> usize {
        self.inner().objects.len()
    }

    /// Check if a foreign id is subscribed.
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.inner().subscriptions.contains(id)
    }

    /// All `set_state` calls in order.
    pub fn writes(&self) -> Vec<StateWrite> {
        self.inner().writes.clone()
    }

    /// `set_state` calls targeting `id`, in order.
    pub fn writes_to(&self, id: &str) -> Vec<StateWrite> {
        self.inner()
            .writes
            .iter()
            .filter(|write| write.id == id)
            .cloned()
            .collect()
    }

    /// Forget the write log.
    pub fn clear_writes(&self) {
        self.inner().writes.clear();
    }
}
