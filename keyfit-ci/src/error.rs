//! Error types for keyfit-ci
//!
//! **[CIN-ERR-010]** Error severity follows the run contract: adapter and
//! parse failures are recovered per record and counted; repository failures
//! abort the batch.

use thiserror::Error;

pub type CiResult<T> = std::result::Result<T, CiError>;

#[derive(Debug, Error)]
pub enum CiError {
    /// Fetch or decode failure at a source adapter; recovered per record
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// A scraped record too malformed to reconcile (no usable key)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Store failure; fatal for the batch, the transaction rolls back
    #[error("Repository error: {0}")]
    Repository(#[from] sqlx::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// keyfit-common error
    #[error("Common error: {0}")]
    Common(#[from] keyfit_common::Error),
}
