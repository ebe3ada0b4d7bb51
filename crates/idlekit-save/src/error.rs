//! Error types for idlekit-save

use thiserror::Error;

/// Save and content loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid save key '{0}': keys must be non-empty and contain no path separators")]
    InvalidKey(String),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error(transparent)]
    Core(#[from] idlekit_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for idlekit_core::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Core(inner) => inner,
            other => idlekit_core::Error::Storage(other.to_string()),
        }
    }
}
