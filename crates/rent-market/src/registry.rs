//! Cancellation flags and active positions, keyed by terms digest.
//!
//! The registry is a plain owned value. It performs no authorization and no
//! transfers; the market validates first and mutates the registry last.

use std::collections::{HashMap, HashSet};

use rent_core::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::authorization::Digest;
use crate::error::MarketError;
use crate::terms::{AssetId, RentalTerms};

/// An accepted, unsettled rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePosition {
    /// Holder of the asset, liable for rent.
    pub taker: Address,
    /// Collateral posted at acceptance.
    pub deposit: Amount,
    /// Collateral still held: `deposit` minus rent already withdrawn.
    pub collateral: Amount,
    /// Acceptance time.
    pub start_time: i64,
    /// Snapshot of the accepted terms.
    pub terms: RentalTerms,
}

impl ActivePosition {
    /// Opens a position with the full deposit still held.
    #[must_use]
    pub fn new(taker: Address, deposit: Amount, start_time: i64, terms: RentalTerms) -> Self {
        Self {
            taker,
            deposit,
            collateral: deposit,
            start_time,
            terms,
        }
    }

    /// Rent already withdrawn by the maker.
    #[must_use]
    pub fn rent_withdrawn(&self) -> Amount {
        self.deposit.saturating_sub(self.collateral)
    }
}

/// A liquidated position whose asset the maker has not yet pulled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reclaim {
    /// Asset still held by the taker.
    pub asset: AssetId,
    /// Current holder.
    pub taker: Address,
    /// Owner entitled to reclaim.
    pub maker: Address,
}

/// Registry of listing state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRegistry {
    positions: HashMap<Digest, ActivePosition>,
    cancelled: HashSet<Digest>,
    last_settled: HashMap<Digest, i64>,
    reclaims: HashMap<Digest, Reclaim>,
}

impl OrderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the maker revoked this listing.
    #[must_use]
    pub fn is_cancelled(&self, digest: &Digest) -> bool {
        self.cancelled.contains(digest)
    }

    /// Permanently bars `digest` from acceptance.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::AlreadyCancelled` if it already is.
    pub fn cancel(&mut self, digest: Digest) -> Result<(), MarketError> {
        if !self.cancelled.insert(digest) {
            return Err(MarketError::AlreadyCancelled(digest));
        }
        Ok(())
    }

    /// Records an accepted position and starts its settlement clock.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::AlreadyActive` if the digest is active or its
    /// liquidated asset is still awaiting reclaim.
    pub fn open(&mut self, digest: Digest, position: ActivePosition) -> Result<(), MarketError> {
        if self.is_occupied(&digest) {
            return Err(MarketError::AlreadyActive(digest));
        }
        self.last_settled.insert(digest, position.start_time);
        self.positions.insert(digest, position);
        Ok(())
    }

    /// True if `open` would be refused for `digest`.
    #[must_use]
    pub fn is_occupied(&self, digest: &Digest) -> bool {
        self.positions.contains_key(digest) || self.reclaims.contains_key(digest)
    }

    /// Removes a position and its settlement time.
    ///
    /// Returns `None` if nothing was active; callers check existence first.
    pub fn close(&mut self, digest: &Digest) -> Option<ActivePosition> {
        self.last_settled.remove(digest);
        self.positions.remove(digest)
    }

    /// The active position under `digest`.
    #[must_use]
    pub fn position(&self, digest: &Digest) -> Option<&ActivePosition> {
        self.positions.get(digest)
    }

    /// Time of the most recent rent settlement for an active position.
    #[must_use]
    pub fn last_settled(&self, digest: &Digest) -> Option<i64> {
        self.last_settled.get(digest).copied()
    }

    /// Books a rent withdrawal: advances the settlement time to `at` and
    /// releases `amount` from the held collateral.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::NotFound` if nothing is active, or
    /// `MarketError::Arithmetic` if `amount` exceeds the held collateral.
    pub fn record_withdrawal(
        &mut self,
        digest: &Digest,
        at: i64,
        amount: Amount,
    ) -> Result<(), MarketError> {
        let position = self
            .positions
            .get_mut(digest)
            .ok_or(MarketError::NotFound(*digest))?;
        position.collateral = position
            .collateral
            .checked_sub(amount)
            .ok_or(MarketError::Arithmetic("withdrawal exceeds collateral"))?;

        let settled = self.last_settled.entry(*digest).or_insert(position.start_time);
        *settled = (*settled).max(at);
        Ok(())
    }

    /// Records that a liquidated asset still sits with the taker.
    pub fn record_reclaim(&mut self, digest: Digest, reclaim: Reclaim) {
        self.reclaims.insert(digest, reclaim);
    }

    /// Outstanding reclaim for `digest`.
    #[must_use]
    pub fn reclaim(&self, digest: &Digest) -> Option<&Reclaim> {
        self.reclaims.get(digest)
    }

    /// Clears an outstanding reclaim.
    pub fn clear_reclaim(&mut self, digest: &Digest) -> Option<Reclaim> {
        self.reclaims.remove(digest)
    }

    /// Number of active positions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.positions.len()
    }

    /// Collateral held across all active positions.
    #[must_use]
    pub fn total_collateral(&self) -> Amount {
        self.positions
            .values()
            .fold(Amount::ZERO, |acc, p| {
                acc.checked_add(p.collateral).unwrap_or(Amount::MAX)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(n: u8) -> Digest {
        Digest::from_bytes([n; 32])
    }

    fn position(start: i64) -> ActivePosition {
        let terms = RentalTerms {
            maker: Address::from_bytes([1; 32]),
            asset: AssetId::new(Address::from_bytes([2; 32]), 1),
            daily_rent: Amount::from_whole(1),
            max_duration: 86_400,
            min_collateral: Amount::from_whole(2),
            listing_expiry: 10_000,
            nonce: 0,
        };
        ActivePosition::new(Address::from_bytes([3; 32]), Amount::from_whole(2), start, terms)
    }

    #[test]
    fn cancel_is_permanent_and_once() {
        let mut registry = OrderRegistry::new();
        assert!(!registry.is_cancelled(&digest(1)));
        registry.cancel(digest(1)).expect("cancel");
        assert!(registry.is_cancelled(&digest(1)));
        assert_eq!(
            registry.cancel(digest(1)),
            Err(MarketError::AlreadyCancelled(digest(1)))
        );
    }

    #[test]
    fn open_initializes_last_settled() {
        let mut registry = OrderRegistry::new();
        registry.open(digest(1), position(500)).expect("open");
        assert_eq!(registry.last_settled(&digest(1)), Some(500));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn open_twice_is_already_active() {
        let mut registry = OrderRegistry::new();
        registry.open(digest(1), position(0)).expect("open");
        assert_eq!(
            registry.open(digest(1), position(10)),
            Err(MarketError::AlreadyActive(digest(1)))
        );
        assert_eq!(registry.last_settled(&digest(1)), Some(0));
    }

    #[test]
    fn open_refused_while_reclaim_outstanding() {
        let mut registry = OrderRegistry::new();
        let p = position(0);
        registry.record_reclaim(
            digest(1),
            Reclaim { asset: p.terms.asset, taker: p.taker, maker: p.terms.maker },
        );
        assert!(registry.open(digest(1), p.clone()).is_err());
        registry.clear_reclaim(&digest(1));
        assert!(registry.open(digest(1), p).is_ok());
    }

    #[test]
    fn close_removes_both_maps() {
        let mut registry = OrderRegistry::new();
        registry.open(digest(1), position(0)).expect("open");
        assert!(registry.close(&digest(1)).is_some());
        assert!(registry.position(&digest(1)).is_none());
        assert!(registry.last_settled(&digest(1)).is_none());
        assert!(registry.close(&digest(1)).is_none());
    }

    #[test]
    fn withdrawal_moves_collateral_and_clock() {
        let mut registry = OrderRegistry::new();
        registry.open(digest(1), position(0)).expect("open");
        registry
            .record_withdrawal(&digest(1), 100, Amount::from_whole(1))
            .expect("withdraw");
        let p = registry.position(&digest(1)).expect("position");
        assert_eq!(p.collateral, Amount::from_whole(1));
        assert_eq!(p.rent_withdrawn(), Amount::from_whole(1));
        assert_eq!(registry.last_settled(&digest(1)), Some(100));

        // Settlement time never moves backwards.
        registry.record_withdrawal(&digest(1), 50, Amount::ZERO).expect("withdraw");
        assert_eq!(registry.last_settled(&digest(1)), Some(100));
    }

    #[test]
    fn withdrawal_beyond_collateral_fails_untouched() {
        let mut registry = OrderRegistry::new();
        registry.open(digest(1), position(0)).expect("open");
        assert!(registry
            .record_withdrawal(&digest(1), 100, Amount::from_whole(3))
            .is_err());
        assert_eq!(registry.last_settled(&digest(1)), Some(0));
        assert_eq!(registry.total_collateral(), Amount::from_whole(2));
    }

    #[test]
    fn withdrawal_on_missing_is_not_found() {
        let mut registry = OrderRegistry::new();
        assert_eq!(
            registry.record_withdrawal(&digest(9), 1, Amount::ZERO),
            Err(MarketError::NotFound(digest(9)))
        );
    }
}
