//! Mock collaborators for testing and development.

pub mod store;

pub use store::{MemoryStore, MemoryStoreHandle, StateWrite, StoredState};
