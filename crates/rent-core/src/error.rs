//! Error types for rent-core.

use thiserror::Error;

/// Errors that can occur in core value and identity operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid amount (overflow, bad format, or negative).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Address bytes or text did not decode to a valid public key.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Signature failed to decode or verify.
    #[error("invalid signature")]
    InvalidSignature,
}
