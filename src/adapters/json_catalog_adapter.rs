//! Session catalog backed by a JSON array of session summaries.

use crate::domain::comparison::SessionSummary;
use crate::domain::error::StratlabError;
use crate::ports::session_catalog_port::SessionCatalog;
use std::fs;
use std::path::Path;

pub struct JsonCatalogAdapter {
    sessions: Vec<SessionSummary>,
}

impl JsonCatalogAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StratlabError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| StratlabError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let adapter = Self::from_str(&content).map_err(|e| match e {
            StratlabError::Data { reason } => StratlabError::Data {
                reason: format!("{}: {}", path.display(), reason),
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), sessions = adapter.sessions.len(), "loaded session catalog");
        Ok(adapter)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, StratlabError> {
        let sessions: Vec<SessionSummary> =
            serde_json::from_str(content).map_err(|e| StratlabError::Data {
                reason: format!("invalid session catalog: {e}"),
            })?;
        Ok(Self { sessions })
    }
}

impl SessionCatalog for JsonCatalogAdapter {
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StratlabError> {
        Ok(self.sessions.clone())
    }
}
