//! Session store port.

use crate::domain::error::StratlabError;
use crate::domain::record::{StepPayload, StepRecord};
use crate::domain::session::StoreKey;

/// Durable, namespaced persistence of one step record per key.
///
/// `put` replaces any previous value atomically: a concurrent `get` on the
/// same key sees either the old record or the new one, never a mix.
/// Implementations must not serialize operations on different keys
/// behind one lock.
pub trait SessionStore: Send + Sync {
    /// Stamps `payload` with the current time and stores it under `key`.
    fn put(&self, key: &StoreKey, payload: &StepPayload) -> Result<StepRecord, StratlabError>;

    /// Fails with [`StratlabError::NotFound`] when nothing is stored and
    /// [`StratlabError::Deserialization`] when the stored bytes do not parse.
    fn get(&self, key: &StoreKey) -> Result<StepRecord, StratlabError>;

    fn has(&self, key: &StoreKey) -> bool;
}
