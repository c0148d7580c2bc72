//! In-process session store.

use crate::domain::error::StratlabError;
use crate::domain::record::{StepPayload, StepRecord};
use crate::domain::session::StoreKey;
use crate::ports::session_store_port::SessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Slot = Arc<Mutex<Option<String>>>;

/// Holds serialized records behind one mutex per key. The outer map lock is
/// only held long enough to find or create a slot.
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<StoreKey, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `text` verbatim, bypassing serialization. Used to ingest
    /// documents written by other producers.
    pub fn put_raw(&self, key: &StoreKey, text: &str) {
        let slot = self.slot(key);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(text.to_string());
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn existing_slot(&self, key: &StoreKey) -> Option<Slot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn slot(&self, key: &StoreKey) -> Slot {
        if let Some(slot) = self.existing_slot(key) {
            return slot;
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

impl SessionStore for MemoryStore {
    fn put(&self, key: &StoreKey, payload: &StepPayload) -> Result<StepRecord, StratlabError> {
        let record = StepRecord::stamped_now(payload.clone());
        let text = serde_json::to_string(&record).map_err(|e| StratlabError::Serialization {
            reason: e.to_string(),
        })?;

        let slot = self.slot(key);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(text);
        tracing::debug!(key = %key, "stored step record");
        Ok(record)
    }

    fn get(&self, key: &StoreKey) -> Result<StepRecord, StratlabError> {
        let not_found = || StratlabError::NotFound {
            key: key.to_string(),
        };
        let slot = self.existing_slot(key).ok_or_else(not_found)?;
        let text = slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(not_found)?;

        serde_json::from_str(&text).map_err(|e| StratlabError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn has(&self, key: &StoreKey) -> bool {
        self.existing_slot(key)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .unwrap_or(false)
    }
}
