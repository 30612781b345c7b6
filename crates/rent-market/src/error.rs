//! Error types for rent-market.

use thiserror::Error;

use rent_core::Amount;

use crate::authorization::Digest;

/// Errors surfaced by market operations.
///
/// Every failure aborts the whole operation; the registry is never left
/// partially updated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarketError {
    /// The listing expiry has passed.
    #[error("listing expired at {expiry}, now {now}")]
    Expired {
        /// Listing expiry (unix seconds).
        expiry: i64,
        /// Time of the attempt.
        now: i64,
    },

    /// Deposit is below the terms' minimum collateral.
    #[error("insufficient deposit: required {required}, offered {offered}")]
    InsufficientDeposit {
        /// Minimum collateral from the terms.
        required: Amount,
        /// Amount the taker offered.
        offered: Amount,
    },

    /// The listing was cancelled by its maker.
    #[error("listing {0} is cancelled")]
    Cancelled(Digest),

    /// Wrong signer, or caller lacks the required role.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The listing is already cancelled.
    #[error("listing {0} is already cancelled")]
    AlreadyCancelled(Digest),

    /// A position under this digest is already active (or awaiting reclaim).
    #[error("listing {0} is already active")]
    AlreadyActive(Digest),

    /// No active position under this digest.
    #[error("no active position for {0}")]
    NotFound(Digest),

    /// Custody collaborator refused to move the asset.
    #[error("custody transfer denied: {0}")]
    CustodyTransferDenied(String),

    /// Value collaborator refused a payment or deposit.
    #[error("value transfer failed: {0}")]
    ValueTransferFailed(String),

    /// Signature could not be decoded or verified.
    #[error("invalid signature")]
    InvalidSignature,

    /// No liquidated asset is awaiting reclaim under this digest.
    #[error("nothing to reclaim for {0}")]
    NotReclaimable(Digest),

    /// Value arithmetic overflowed.
    #[error("arithmetic overflow: {0}")]
    Arithmetic(&'static str),

    /// Configuration failed validation or parsing.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<rent_core::CoreError> for MarketError {
    fn from(e: rent_core::CoreError) -> Self {
        match e {
            rent_core::CoreError::InvalidSignature | rent_core::CoreError::InvalidAddress(_) => {
                Self::InvalidSignature
            }
            rent_core::CoreError::InvalidAmount(msg) => Self::InvalidConfig(msg),
        }
    }
}
