//! Session identity and store keys.

use crate::domain::error::StratlabError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one strategy-construction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self, StratlabError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StratlabError::InvalidSessionId {
                session_id: id,
                reason: "session id must not be empty".into(),
            });
        }
        Ok(Self(id))
    }

    /// Fresh random id for a new attempt.
    pub fn generate() -> Self {
        Self(format!("session_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one step record: a step's storage namespace plus the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub namespace: String,
    pub session_id: SessionId,
}

impl StoreKey {
    pub fn new(namespace: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            namespace: namespace.into(),
            session_id,
        }
    }
}

/// Renders the flat `{namespace}_{sessionId}` form used in logs and messages.
impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.namespace, self.session_id)
    }
}
