//! Domain error types.

use crate::domain::record::ModuleKind;

/// Top-level error type for stratlab.
#[derive(Debug, thiserror::Error)]
pub enum StratlabError {
    #[error("no stored value for {key}")]
    NotFound { key: String },

    #[error("stored value for {key} is corrupted: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("failed to serialize payload: {reason}")]
    Serialization { reason: String },

    #[error("unknown step: {step_id}")]
    UnknownStep { step_id: String },

    #[error("invalid step definition {step_id:?}: {reason}")]
    InvalidStep { step_id: String, reason: String },

    #[error("invalid session id {session_id:?}: {reason}")]
    InvalidSessionId { session_id: String, reason: String },

    #[error("select at least two sessions to compare (got {selected})")]
    InsufficientSelection { selected: usize },

    #[error("{series} is empty")]
    EmptySeries { series: &'static str },

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("payload schema mismatch: expected {expected}, found {found}")]
    PayloadSchema {
        expected: ModuleKind,
        found: ModuleKind,
    },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratlabError> for std::process::ExitCode {
    fn from(err: &StratlabError) -> Self {
        let code: u8 = match err {
            StratlabError::Io(_) => 1,
            StratlabError::ConfigParse { .. }
            | StratlabError::ConfigMissing { .. }
            | StratlabError::ConfigInvalid { .. }
            | StratlabError::InvalidStep { .. } => 2,
            StratlabError::Database { .. }
            | StratlabError::DatabaseQuery { .. }
            | StratlabError::NotFound { .. } => 3,
            StratlabError::Deserialization { .. }
            | StratlabError::Serialization { .. }
            | StratlabError::PayloadSchema { .. }
            | StratlabError::Data { .. } => 4,
            StratlabError::UnknownStep { .. }
            | StratlabError::InvalidSessionId { .. }
            | StratlabError::InsufficientSelection { .. }
            | StratlabError::EmptySeries { .. }
            | StratlabError::SessionNotFound { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
