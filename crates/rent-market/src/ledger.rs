//! External custody and value collaborators.
//!
//! The engine never holds assets or balances itself. It asks an
//! [`AssetCustody`] to move unique assets and a [`ValueTransfer`] to collect
//! deposits and pay out of escrow. In-memory implementations are provided for
//! tests and simulations.

use std::collections::{HashMap, HashSet};

use rent_core::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::terms::AssetId;

/// Moves unique assets between owners.
pub trait AssetCustody {
    /// Current owner of `asset`.
    fn owner_of(&self, asset: &AssetId) -> Option<Address>;

    /// Operator currently approved to move `asset` on its owner's behalf.
    fn approved_operator(&self, asset: &AssetId) -> Option<Address>;

    /// Moves `asset` from `from` to `to`, acting as `operator`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::CustodyTransferDenied` unless `from` owns the
    /// asset and has approved `operator`.
    fn transfer(
        &mut self,
        operator: Address,
        asset: &AssetId,
        from: Address,
        to: Address,
    ) -> Result<(), MarketError>;

    /// Read-only check that `transfer(operator, asset, from, _)` would be
    /// allowed.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::CustodyTransferDenied` describing the refusal.
    fn check_transfer(
        &self,
        operator: Address,
        asset: &AssetId,
        from: Address,
    ) -> Result<(), MarketError> {
        if self.owner_of(asset) != Some(from) {
            return Err(MarketError::CustodyTransferDenied(format!(
                "{from} does not own {asset}"
            )));
        }
        if self.approved_operator(asset) != Some(operator) {
            return Err(MarketError::CustodyTransferDenied(format!(
                "{operator} is not approved to move {asset}"
            )));
        }
        Ok(())
    }
}

/// A single outgoing payment from escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Recipient.
    pub to: Address,
    /// Amount.
    pub amount: Amount,
}

/// Moves value into and out of the engine's escrow.
pub trait ValueTransfer {
    /// Value currently held in escrow.
    fn escrow_balance(&self) -> Amount;

    /// Pulls `amount` from `from` into escrow.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::ValueTransferFailed` if `from` cannot cover it.
    fn collect(&mut self, from: Address, amount: Amount) -> Result<(), MarketError>;

    /// Read-only check that `pay_all(payouts)` would succeed.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::ValueTransferFailed` if escrow is short or any
    /// recipient refuses.
    fn check_payouts(&self, payouts: &[Payout]) -> Result<(), MarketError>;

    /// Pays every entry in `payouts` out of escrow, or none of them.
    ///
    /// Must succeed whenever [`ValueTransfer::check_payouts`] accepted the
    /// same payouts and nothing touched escrow in between.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::ValueTransferFailed` if escrow is short or any
    /// recipient refuses; no payment is made in that case.
    fn pay_all(&mut self, payouts: &[Payout]) -> Result<(), MarketError>;

    /// Pays a single recipient out of escrow.
    ///
    /// # Errors
    ///
    /// See [`ValueTransfer::pay_all`].
    fn pay(&mut self, to: Address, amount: Amount) -> Result<(), MarketError> {
        self.pay_all(&[Payout { to, amount }])
    }
}

/// In-memory asset registry with per-asset operator approval.
///
/// Approval is cleared whenever the asset changes hands, so every hop needs a
/// fresh approval from the new owner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustody {
    owners: HashMap<AssetId, Address>,
    approvals: HashMap<AssetId, Address>,
}

impl InMemoryCustody {
    /// Creates an empty custody registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues `asset` to `owner`.
    pub fn mint(&mut self, asset: AssetId, owner: Address) {
        self.owners.insert(asset, owner);
        self.approvals.remove(&asset);
    }

    /// Lets `operator` move `asset`, on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::Unauthorized` if `owner` does not own `asset`.
    pub fn approve(
        &mut self,
        owner: Address,
        asset: AssetId,
        operator: Address,
    ) -> Result<(), MarketError> {
        if self.owners.get(&asset) != Some(&owner) {
            return Err(MarketError::Unauthorized(format!(
                "{owner} cannot approve {asset}"
            )));
        }
        self.approvals.insert(asset, operator);
        Ok(())
    }

    /// Withdraws any approval on `asset`.
    pub fn revoke(&mut self, asset: &AssetId) {
        self.approvals.remove(asset);
    }
}

impl AssetCustody for InMemoryCustody {
    fn owner_of(&self, asset: &AssetId) -> Option<Address> {
        self.owners.get(asset).copied()
    }

    fn approved_operator(&self, asset: &AssetId) -> Option<Address> {
        self.approvals.get(asset).copied()
    }

    fn transfer(
        &mut self,
        operator: Address,
        asset: &AssetId,
        from: Address,
        to: Address,
    ) -> Result<(), MarketError> {
        self.check_transfer(operator, asset, from)?;
        self.owners.insert(*asset, to);
        self.approvals.remove(asset);
        Ok(())
    }
}

/// In-memory balances plus an escrow pot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    balances: HashMap<Address, Amount>,
    escrow: Amount,
    refusing: HashSet<Address>,
}

impl InMemoryBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `account` out of thin air.
    pub fn fund(&mut self, account: Address, amount: Amount) {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.checked_add(amount).unwrap_or(Amount::MAX);
    }

    /// Balance of `account`.
    #[must_use]
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Makes `account` reject incoming payments.
    pub fn refuse_payments(&mut self, account: Address) {
        self.refusing.insert(account);
    }

    /// Lets `account` receive payments again.
    pub fn accept_payments(&mut self, account: &Address) {
        self.refusing.remove(account);
    }
}

impl ValueTransfer for InMemoryBank {
    fn escrow_balance(&self) -> Amount {
        self.escrow
    }

    fn collect(&mut self, from: Address, amount: Amount) -> Result<(), MarketError> {
        let available = self.balance_of(&from);
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            MarketError::ValueTransferFailed(format!(
                "{from} holds {available}, needs {amount}"
            ))
        })?;
        let escrow = self
            .escrow
            .checked_add(amount)
            .ok_or(MarketError::Arithmetic("escrow overflow"))?;
        self.balances.insert(from, remaining);
        self.escrow = escrow;
        Ok(())
    }

    fn check_payouts(&self, payouts: &[Payout]) -> Result<(), MarketError> {
        let mut total = Amount::ZERO;
        for payout in payouts.iter().filter(|p| !p.amount.is_zero()) {
            if self.refusing.contains(&payout.to) {
                return Err(MarketError::ValueTransferFailed(format!(
                    "{} refused payment",
                    payout.to
                )));
            }
            total = total
                .checked_add(payout.amount)
                .ok_or(MarketError::Arithmetic("payout overflow"))?;
        }
        if total > self.escrow {
            return Err(MarketError::ValueTransferFailed(format!(
                "escrow holds {}, payouts need {total}",
                self.escrow
            )));
        }
        Ok(())
    }

    fn pay_all(&mut self, payouts: &[Payout]) -> Result<(), MarketError> {
        self.check_payouts(payouts)?;
        for payout in payouts {
            self.escrow = self.escrow.saturating_sub(payout.amount);
            self.fund(payout.to, payout.amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 32])
    }

    fn asset() -> AssetId {
        AssetId::new(addr(100), 1)
    }

    #[test]
    fn transfer_needs_owner_and_approval() {
        let mut custody = InMemoryCustody::new();
        custody.mint(asset(), addr(1));

        let denied = custody.transfer(addr(9), &asset(), addr(1), addr(2));
        assert!(matches!(denied, Err(MarketError::CustodyTransferDenied(_))));

        custody.approve(addr(1), asset(), addr(9)).expect("approve");
        let wrong_owner = custody.transfer(addr(9), &asset(), addr(3), addr(2));
        assert!(matches!(wrong_owner, Err(MarketError::CustodyTransferDenied(_))));

        custody.transfer(addr(9), &asset(), addr(1), addr(2)).expect("transfer");
        assert_eq!(custody.owner_of(&asset()), Some(addr(2)));
        assert_eq!(custody.approved_operator(&asset()), None);
    }

    #[test]
    fn only_owner_can_approve() {
        let mut custody = InMemoryCustody::new();
        custody.mint(asset(), addr(1));
        assert!(custody.approve(addr(2), asset(), addr(9)).is_err());
        custody.approve(addr(1), asset(), addr(9)).expect("approve");
        custody.revoke(&asset());
        assert!(custody.check_transfer(addr(9), &asset(), addr(1)).is_err());
    }

    #[test]
    fn collect_moves_into_escrow() {
        let mut bank = InMemoryBank::new();
        bank.fund(addr(1), Amount::from_whole(5));
        bank.collect(addr(1), Amount::from_whole(2)).expect("collect");
        assert_eq!(bank.balance_of(&addr(1)), Amount::from_whole(3));
        assert_eq!(bank.escrow_balance(), Amount::from_whole(2));
        assert!(bank.collect(addr(1), Amount::from_whole(4)).is_err());
        assert_eq!(bank.escrow_balance(), Amount::from_whole(2));
    }

    #[test]
    fn pay_all_is_all_or_nothing() {
        let mut bank = InMemoryBank::new();
        bank.fund(addr(1), Amount::from_whole(3));
        bank.collect(addr(1), Amount::from_whole(3)).expect("collect");
        bank.refuse_payments(addr(3));

        let payouts = [
            Payout { to: addr(2), amount: Amount::from_whole(1) },
            Payout { to: addr(3), amount: Amount::from_whole(1) },
        ];
        assert!(matches!(
            bank.pay_all(&payouts),
            Err(MarketError::ValueTransferFailed(_))
        ));
        assert_eq!(bank.balance_of(&addr(2)), Amount::ZERO);
        assert_eq!(bank.escrow_balance(), Amount::from_whole(3));

        bank.accept_payments(&addr(3));
        bank.pay_all(&payouts).expect("pay");
        assert_eq!(bank.balance_of(&addr(3)), Amount::from_whole(1));
        assert_eq!(bank.escrow_balance(), Amount::from_whole(1));
    }

    #[test]
    fn check_payouts_matches_pay_all_without_moving_value() {
        let mut bank = InMemoryBank::new();
        bank.fund(addr(1), Amount::from_whole(2));
        bank.collect(addr(1), Amount::from_whole(2)).expect("collect");

        let too_much = [Payout { to: addr(2), amount: Amount::from_whole(3) }];
        assert!(bank.check_payouts(&too_much).is_err());

        bank.refuse_payments(addr(3));
        let refused = [Payout { to: addr(3), amount: Amount::from_whole(1) }];
        assert!(bank.check_payouts(&refused).is_err());

        let fine = [Payout { to: addr(2), amount: Amount::from_whole(2) }];
        bank.check_payouts(&fine).expect("check");
        assert_eq!(bank.escrow_balance(), Amount::from_whole(2));
        assert_eq!(bank.balance_of(&addr(2)), Amount::ZERO);
        bank.pay_all(&fine).expect("pay");
        assert_eq!(bank.escrow_balance(), Amount::ZERO);
    }

    #[test]
    fn pay_beyond_escrow_fails() {
        let mut bank = InMemoryBank::new();
        assert!(bank.pay(addr(2), Amount::from_raw(1)).is_err());
        assert!(bank.pay(addr(2), Amount::ZERO).is_ok());
    }

    #[test]
    fn zero_payout_to_refusing_recipient_is_skipped() {
        let mut bank = InMemoryBank::new();
        bank.refuse_payments(addr(2));
        assert!(bank.pay(addr(2), Amount::ZERO).is_ok());
    }
}
