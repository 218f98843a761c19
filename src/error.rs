//! Error types for the lyrics editor core
//!
//! Value, data and user errors propagate to whoever invoked the command.
//! `InvalidState` marks a broken internal invariant and is not meant to be
//! recovered from.

use thiserror::Error;

/// Top-level editor error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// Malformed input to a pure parser or constructor (bad timing string, bad color)
    #[error("Invalid value: {0}")]
    Value(String),

    /// Structurally invalid persisted document
    #[error("Invalid data: {0}")]
    Data(String),

    /// Well-formed operation rejected by the editing policy
    #[error("{0}")]
    User(String),

    /// Internal invariant violation (should never happen, indicates a bug)
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl EditorError {
    pub fn value(msg: impl Into<String>) -> Self {
        EditorError::Value(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        EditorError::Data(msg.into())
    }

    pub fn user(msg: impl Into<String>) -> Self {
        EditorError::User(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        EditorError::InvalidState(msg.into())
    }

    /// Whether this is a policy rejection the UI may show to the user as-is
    pub fn is_user_error(&self) -> bool {
        matches!(self, EditorError::User(_))
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Data(format!("JSON: {}", e))
    }
}

impl From<serde_yaml::Error> for EditorError {
    fn from(e: serde_yaml::Error) -> Self {
        EditorError::Data(format!("YAML: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
