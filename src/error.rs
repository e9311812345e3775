//! Error type shared by every layer of the crate.

use thiserror::Error;

/// Result type alias for bookmark operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No active session with the auth provider.
    #[error("Not signed in")]
    Unauthenticated,

    /// Form input rejected before anything was sent to the store.
    #[error("Invalid bookmark: {0}")]
    Validation(String),

    #[error("Bookmark not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// The change notification channel could not be opened or has failed.
    #[error("Realtime channel error: {0}")]
    Channel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}
