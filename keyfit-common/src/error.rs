//! Common error types for KeyFit

use thiserror::Error;

/// Common result type for KeyFit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across KeyFit services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored record violates a structural invariant
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
