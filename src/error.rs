//! Error types for the Turnstile engine.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// Quota exhaustion is deliberately absent here: a rejected request is an
/// ordinary [`Decision`](crate::admission::Decision) with `admitted == false`,
/// never an error. Only configuration and I/O problems surface as errors.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
