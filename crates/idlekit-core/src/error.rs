//! Error types for idlekit-core

use thiserror::Error;

/// Core error type
///
/// The `*NotFound` variants signal wiring mistakes (a payload whose `type` has
/// no registered handler). They are never caught inside the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot evaluate condition of type '{kind}' because its evaluator is not registered. Registered evaluators are: {registered}")]
    ConditionNotFound { kind: String, registered: String },

    #[error("Cannot consume input of type '{kind}' because its consumer is not registered. Registered consumers are: {registered}")]
    InputNotFound { kind: String, registered: String },

    #[error("Cannot produce output of type '{kind}' because its producer is not registered. Registered producers are: {registered}")]
    OutputNotFound { kind: String, registered: String },

    #[error("Cannot resolve request of type '{kind}' because its controller is not registered. Registered controllers are: {registered}")]
    ControllerNotFound { kind: String, registered: String },

    #[error("Cannot modify bonus of type '{kind}' because its modifier is not registered. Registered modifiers are: {registered}")]
    ModifierNotFound { kind: String, registered: String },

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Unknown {category} with id '{id}'")]
    UnknownContent { category: String, id: String },

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid payload '{kind}': field '{field}' {reason}")]
    InvalidPayload {
        kind: String,
        field: String,
        reason: String,
    },

    #[error("Invalid save data for '{owner}': {reason}")]
    InvalidSaveData { owner: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Create an unknown content error
    pub fn unknown(category: impl Into<String>, id: impl Into<String>) -> Self {
        Error::UnknownContent {
            category: category.into(),
            id: id.into(),
        }
    }

    /// Create an invalid save data error
    pub fn invalid_save(owner: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidSaveData {
            owner: owner.into(),
            reason: reason.into(),
        }
    }

    /// Check whether this is one of the registry lookup failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ConditionNotFound { .. }
                | Error::InputNotFound { .. }
                | Error::OutputNotFound { .. }
                | Error::ControllerNotFound { .. }
                | Error::ModifierNotFound { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
