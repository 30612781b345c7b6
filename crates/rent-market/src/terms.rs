//! The maker's rental intent.

use std::fmt;

use rent_core::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Identifies a unique asset: the contract (or collection) that issued it plus
/// its id within that contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId {
    /// Issuing contract.
    pub contract: Address,
    /// Token id within the contract.
    pub token_id: u64,
}

impl AssetId {
    /// Creates an asset id.
    #[must_use]
    pub const fn new(contract: Address, token_id: u64) -> Self {
        Self { contract, token_id }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.contract, self.token_id)
    }
}

/// A signed, immutable offer to rent out one asset.
///
/// Two intents with identical fields are the same listing: they hash to the
/// same digest and share registry state. Makers pick a fresh `nonce` to list
/// the same economic terms again as an independent listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalTerms {
    /// Owner entitled to rent and to the asset's return.
    pub maker: Address,
    /// The asset on offer.
    pub asset: AssetId,
    /// Rent owed per 24 hours of active rental.
    pub daily_rent: Amount,
    /// Seconds the rental may run before it is liquidated.
    pub max_duration: u64,
    /// Minimum collateral a taker must post.
    pub min_collateral: Amount,
    /// Unix time from which the intent can no longer be accepted.
    pub listing_expiry: i64,
    /// Maker-chosen listing sequence number.
    pub nonce: u64,
}

impl RentalTerms {
    /// Last instant (inclusive) a position started at `start` stays in term.
    #[must_use]
    pub fn term_end(&self, start: i64) -> i64 {
        let max = i64::try_from(self.max_duration).unwrap_or(i64::MAX);
        start.saturating_add(max)
    }

    /// True if the intent can still be accepted at `now`.
    #[must_use]
    pub const fn is_listed_at(&self, now: i64) -> bool {
        now < self.listing_expiry
    }
}
