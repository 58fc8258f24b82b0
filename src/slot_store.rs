//! Storage seam: a key-value store of named slots, each holding one
//! collection serialized as a JSON array.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::app_response::AppResponse;

/// Whole-value read/replace access to named slots.
///
/// Implemented by the LMDB-backed [`AppDbState`](crate::local_db_state::AppDbState)
/// and by [`MemoryStore`]. The repository only talks to this trait, so the
/// mechanism underneath can change without touching view logic.
pub trait SlotStore {
    /// Raw contents of a slot, `None` when the slot was never written.
    fn read_slot(&self, key: &str) -> Result<Option<String>, AppResponse>;

    /// Replaces the slot contents.
    fn write_slot(&self, key: &str, value: &str) -> Result<(), AppResponse>;

    /// Removes the slot. Returns `false` if it did not exist.
    fn remove_slot(&self, key: &str) -> Result<bool, AppResponse>;
}

/// Process-local slot store with no persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemoryStore {
    fn read_slot(&self, key: &str) -> Result<Option<String>, AppResponse> {
        let slots = self
            .slots
            .read()
            .map_err(|_| AppResponse::DatabaseError("Memory store lock poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), AppResponse> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| AppResponse::DatabaseError("Memory store lock poisoned".to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> Result<bool, AppResponse> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| AppResponse::DatabaseError("Memory store lock poisoned".to_string()))?;
        Ok(slots.remove(key).is_some())
    }
}
