//! State synchronization between device handlers and the state store.
//!
//! [`StateSync`] owns the store handle, the acknowledged-value cache and the
//! listener tables. Listeners are plain descriptors naming the handler that
//! owns an id; [`StateSync::route`] classifies an incoming change and the
//! device manager invokes the matching handler.

use crate::error::Result;
use crate::store::{BoxedStore, ObjectDeclaration, StateChange};
use pinbridge_core::{BusAddress, StateId, StateValue};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Capacity of the acknowledged-value broadcast channel.
pub const ACK_CHANNEL_CAPACITY: usize = 64;

/// Handler a listener points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    /// Write request for an output pin.
    Output { address: BusAddress, pin: usize },

    /// Trigger on a foreign interrupt line.
    Interrupt { address: BusAddress },
}

impl Listener {
    /// Address of the owning handler.
    pub fn address(&self) -> BusAddress {
        match self {
            Self::Output { address, .. } | Self::Interrupt { address } => *address,
        }
    }
}

/// Outcome of routing one change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Write request for one of our own ids.
    Local {
        listener: Listener,
        previous: Option<StateValue>,
        value: StateValue,
    },

    /// Change of a foreign id we subscribed to, whatever its ack flag.
    Foreign { listener: Listener, value: StateValue },

    /// Acknowledgment echo of our own write; nothing to do.
    AckEcho,

    /// No listener owns the id.
    Unsupported { id: String },
}

/// Value published with ack=true, as seen by broadcast subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledged {
    pub id: StateId,
    pub value: StateValue,
}

/// Single source of truth for acknowledged values and change routing.
pub struct StateSync {
    namespace: String,
    store: BoxedStore,

    /// Last acknowledged value per fully qualified id.
    cache: HashMap<String, StateValue>,

    /// Own ids, fully qualified.
    local: HashMap<String, Listener>,

    /// Foreign ids, verbatim.
    foreign: HashMap<String, Listener>,

    acknowledged: broadcast::Sender<Acknowledged>,
}

impl std::fmt::Debug for StateSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSync")
            .field("namespace", &self.namespace)
            .field("cached", &self.cache.len())
            .field("local", &self.local.len())
            .field("foreign", &self.foreign.len())
            .finish_non_exhaustive()
    }
}

impl StateSync {
    /// Create a synchronizer for `namespace` backed by `store`.
    pub fn new(namespace: impl Into<String>, store: BoxedStore) -> Self {
        let (acknowledged, _) = broadcast::channel(ACK_CHANNEL_CAPACITY);
        Self {
            namespace: namespace.into(),
            store,
            cache: HashMap::new(),
            local: HashMap::new(),
            foreign: HashMap::new(),
            acknowledged,
        }
    }

    /// Namespace prefix of our own ids.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified form of a relative id.
    pub fn qualify(&self, id: &StateId) -> String {
        id.qualified(&self.namespace)
    }

    /// Load acknowledged values of our namespace into the cache.
    ///
    /// Returns the number of values loaded.
    pub fn seed(&mut self) -> Result<usize> {
        let states = self.store.acknowledged_states()?;
        let before = self.cache.len();
        for (id, value) in states {
            if StateId::from_qualified(&id, &self.namespace).is_some() {
                self.cache.insert(id, value);
            }
        }
        let loaded = self.cache.len() - before;
        debug!(namespace = %self.namespace, loaded, "Seeded acknowledged values");
        Ok(loaded)
    }

    /// Publish a device-confirmed value.
    ///
    /// The cache is updated before the store call so that a later read never
    /// sees an older value, even if the push fails.
    pub fn set_acknowledged(&mut self, id: &StateId, value: impl Into<StateValue>) -> Result<()> {
        let value = value.into();
        let full = self.qualify(id);
        trace!(id = %full, %value, "Acknowledging");
        self.cache.insert(full.clone(), value);
        let _ = self.acknowledged.send(Acknowledged {
            id: id.clone(),
            value,
        });
        self.store.set_state(&full, value, true)?;
        Ok(())
    }

    /// Last acknowledged value of one of our ids.
    pub fn cached_value(&self, id: &StateId) -> Option<StateValue> {
        self.cache.get(&self.qualify(id)).copied()
    }

    /// Subscribe to every acknowledged value published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Acknowledged> {
        self.acknowledged.subscribe()
    }

    /// Declare object metadata for one of our ids.
    pub fn declare_object(&mut self, id: &StateId, object: ObjectDeclaration) -> Result<()> {
        let full = self.qualify(id);
        self.store.extend_object(&full, object)?;
        Ok(())
    }

    /// Register the listener for write requests on one of our ids.
    ///
    /// Replaces and returns any previous listener for the same id.
    pub fn add_local_listener(&mut self, id: &StateId, listener: Listener) -> Option<Listener> {
        let full = self.qualify(id);
        self.local.insert(full, listener)
    }

    /// Remove the listener for one of our ids.
    pub fn remove_local_listener(&mut self, id: &StateId) -> Option<Listener> {
        let full = self.qualify(id);
        self.local.remove(&full)
    }

    /// Check if a foreign object exists.
    pub fn foreign_object_exists(&self, id: &str) -> Result<bool> {
        Ok(self.store.object_exists(id)?)
    }

    /// Subscribe to a foreign id and register its listener.
    ///
    /// Replaces and returns any previous listener for the same id.
    pub fn add_foreign_listener(&mut self, id: &str, listener: Listener) -> Result<Option<Listener>> {
        self.store.subscribe_foreign(id)?;
        Ok(self.foreign.insert(id.to_string(), listener))
    }

    /// Unsubscribe from a foreign id and drop its listener.
    ///
    /// Only the listener registered by `owner` is removed; a listener that
    /// another device registered later for the same id is left in place.
    pub fn remove_foreign_listener(&mut self, id: &str, owner: BusAddress) -> Result<Option<Listener>> {
        match self.foreign.get(id) {
            Some(listener) if listener.address() == owner => {}
            _ => return Ok(None),
        }
        let removed = self.foreign.remove(id);
        self.store.unsubscribe_foreign(id)?;
        Ok(removed)
    }

    /// Number of registered listeners, local and foreign.
    pub fn listener_count(&self) -> usize {
        self.local.len() + self.foreign.len()
    }

    /// Classify a change notification.
    ///
    /// Foreign ids are delivered regardless of the ack flag. Acknowledged
    /// changes of our own ids are echoes of our own writes and are dropped.
    pub fn route(&self, change: &StateChange) -> Route {
        if let Some(listener) = self.foreign.get(&change.id) {
            return Route::Foreign {
                listener: *listener,
                value: change.value,
            };
        }
        if change.ack {
            return Route::AckEcho;
        }
        match self.local.get(&change.id) {
            Some(listener) => Route::Local {
                listener: *listener,
                previous: self.cache.get(&change.id).copied(),
                value: change.value,
            },
            None => Route::Unsupported {
                id: change.id.clone(),
            },
        }
    }
}
