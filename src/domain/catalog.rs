//! Listing and selecting recorded sessions.

use crate::domain::comparison::SessionSummary;
use crate::domain::error::StratlabError;

/// Module filter is a case-insensitive exact match; search is a
/// case-insensitive substring of either the name or the module.
pub fn filter_sessions<'a>(
    sessions: &'a [SessionSummary],
    module: Option<&str>,
    search: Option<&str>,
) -> Vec<&'a SessionSummary> {
    let module = module.map(str::trim).filter(|m| !m.is_empty()).map(str::to_lowercase);
    let search = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);

    sessions
        .iter()
        .filter(|s| match &module {
            Some(m) => s.module.to_lowercase() == *m,
            None => true,
        })
        .filter(|s| match &search {
            Some(term) => {
                s.name.to_lowercase().contains(term) || s.module.to_lowercase().contains(term)
            }
            None => true,
        })
        .collect()
}

/// Picks sessions in the order `ids` names them. Repeated ids are kept once.
pub fn select_sessions(
    sessions: &[SessionSummary],
    ids: &[String],
) -> Result<Vec<SessionSummary>, StratlabError> {
    let mut selected: Vec<SessionSummary> = Vec::with_capacity(ids.len());
    for id in ids {
        if selected.iter().any(|s| s.id == *id) {
            continue;
        }
        let found = sessions
            .iter()
            .find(|s| s.id == *id)
            .ok_or_else(|| StratlabError::SessionNotFound {
                session_id: id.clone(),
            })?;
        selected.push(found.clone());
    }
    Ok(selected)
}
