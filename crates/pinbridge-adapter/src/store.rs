//! State store contract.
//!
//! The host platform's object/state store is an external collaborator. The
//! adapter needs only a narrow slice of it: declare objects, push values,
//! query acknowledged values at startup, and subscribe to foreign ids used as
//! interrupt lines. Change notifications flow the other way, into the adapter
//! event loop, as [`StateChange`] values.

use pinbridge_core::StateValue;
use serde::{Deserialize, Serialize};

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a state store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("State store unavailable: {message}")]
    Unavailable { message: String },

    /// The requested object does not exist.
    #[error("Object not found: {id}")]
    NotFound { id: String },

    /// Any other failure reported by the store.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a new unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Kind of a declared object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Device,
    State,
}

/// Value type of a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
}

/// Metadata declared for a device or one of its state points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDeclaration {
    /// Object kind.
    pub kind: ObjectKind,

    /// Human-readable label.
    pub name: String,

    /// Role tag used by the host's visualization.
    pub role: String,

    /// Readable by automation logic.
    pub read: bool,

    /// Writable by automation logic.
    pub write: bool,

    /// Value type; `None` for devices.
    pub value_type: Option<ValueType>,

    /// Configuration the object was created from.
    pub native: serde_json::Value,
}

impl ObjectDeclaration {
    /// Device object.
    pub fn device(name: impl Into<String>, native: serde_json::Value) -> Self {
        Self {
            kind: ObjectKind::Device,
            name: name.into(),
            role: "sensor".to_string(),
            read: false,
            write: false,
            value_type: None,
            native,
        }
    }

    /// Read-only boolean state fed from the bus.
    pub fn input(name: impl Into<String>, native: serde_json::Value) -> Self {
        Self {
            kind: ObjectKind::State,
            name: name.into(),
            role: "indicator".to_string(),
            read: true,
            write: false,
            value_type: Some(ValueType::Boolean),
            native,
        }
    }

    /// Writable boolean state driving the bus.
    pub fn output(name: impl Into<String>, native: serde_json::Value) -> Self {
        Self {
            kind: ObjectKind::State,
            name: name.into(),
            role: "switch".to_string(),
            read: false,
            write: true,
            value_type: Some(ValueType::Boolean),
            native,
        }
    }
}

/// Change notification delivered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Fully qualified id of the changed state.
    pub id: String,

    /// New value.
    pub value: StateValue,

    /// Whether the change is a device acknowledgment.
    pub ack: bool,
}

impl StateChange {
    /// A write request (ack=false), as issued by automation logic.
    pub fn command(id: impl Into<String>, value: impl Into<StateValue>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ack: false,
        }
    }

    /// An acknowledged value, as echoed back after a device confirmed it.
    pub fn acknowledged(id: impl Into<String>, value: impl Into<StateValue>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ack: true,
        }
    }
}

/// State store collaborator.
///
/// Ids passed to this trait are fully qualified (namespace included) for the
/// adapter's own states and verbatim for foreign states.
pub trait StateStore {
    /// Push a value.
    fn set_state(&mut self, id: &str, value: StateValue, ack: bool) -> StoreResult<()>;

    /// Create or update object metadata.
    fn extend_object(&mut self, id: &str, object: ObjectDeclaration) -> StoreResult<()>;

    /// All values currently stored with ack=true.
    fn acknowledged_states(&self) -> StoreResult<Vec<(String, StateValue)>>;

    /// Check if an object exists (used for foreign interrupt ids).
    fn object_exists(&self, id: &str) -> StoreResult<bool>;

    /// Start delivering change notifications for a foreign id.
    fn subscribe_foreign(&mut self, id: &str) -> StoreResult<()>;

    /// Stop delivering change notifications for a foreign id.
    fn unsubscribe_foreign(&mut self, id: &str) -> StoreResult<()>;
}

/// Owned, sendable store handle.
pub type BoxedStore = Box<dyn StateStore + Send>;
