//! Session catalog port.

use crate::domain::comparison::SessionSummary;
use crate::domain::error::StratlabError;

/// Source of previously recorded session summaries.
pub trait SessionCatalog {
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StratlabError>;
}
