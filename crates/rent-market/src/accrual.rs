//! Rent accrual and liquidation checks.
//!
//! # Rounding
//!
//! The per-second rate is `ceil(daily_rent × PRECISION / 86400)`: scaled so a
//! sub-unit daily rate never truncates to zero, and rounded up so the engine
//! never under-charges on the rate. Rent over an interval is
//! `floor(elapsed × rate / PRECISION)`, rounded down on that final step. The
//! asymmetry is intentional and the same rate feeds accrual, solvency and the
//! settlement refund.
//!
//! Rent already realized in the solvency check is the sum actually withdrawn
//! (`deposit − collateral`), not `(last_settled − start_time) × rate` recomputed
//! in one step. Each withdrawal floors separately, so the withdrawn sum can sit
//! a few raw units below the one-step figure and the check is that much more
//! lenient. In exchange the refund plus every payout adds up to the deposit
//! exactly.
//!
//! Everything here is pure. Nothing in this module touches the registry.

use rent_core::Amount;
use serde::{Deserialize, Serialize};

use crate::registry::ActivePosition;

/// Fixed-point scale for the per-second rate.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Seconds in a rental day.
pub const SECONDS_PER_DAY: u128 = 86_400;

/// Why a position must be liquidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationReason {
    /// The rental ran past `max_duration`.
    Expired,
    /// Rent owed since the start exceeds the deposit.
    Insolvent,
}

/// Outcome of assessing a position at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assessment {
    /// The full remaining collateral is forfeit to the maker.
    Liquidate {
        /// Trigger.
        reason: LiquidationReason,
        /// Collateral still held, all of which goes to the maker.
        collateral: Amount,
    },
    /// The position is healthy; `pending` rent is owed since last settlement.
    Accrue {
        /// Unsettled rent.
        pending: Amount,
    },
}

impl Assessment {
    /// True for the liquidation branch.
    #[must_use]
    pub const fn is_liquidation(&self) -> bool {
        matches!(self, Self::Liquidate { .. })
    }
}

/// Scaled per-second rate for a daily rent, rounded up.
#[must_use]
pub fn rate_per_second(daily_rent: Amount) -> u128 {
    let scaled = u128::from(daily_rent.raw()) * PRECISION;
    scaled.div_ceil(SECONDS_PER_DAY)
}

/// Rent for `elapsed` seconds at a scaled `rate`, rounded down.
///
/// Saturates at [`Amount::MAX`]; a saturated figure always exceeds any
/// collateral and so routes to liquidation.
#[must_use]
pub fn rent_for(elapsed: u64, rate: u128) -> Amount {
    let units = u128::from(elapsed)
        .checked_mul(rate)
        .map_or(u128::MAX, |scaled| scaled / PRECISION);
    Amount::from_raw(u64::try_from(units).unwrap_or(u64::MAX))
}

/// Assesses `position`, last settled at `last_settled`, at time `now`.
///
/// Expiry is checked first and dominates: past `start_time + max_duration`
/// the result is always liquidation, whatever rent is pending.
#[must_use]
pub fn assess(position: &ActivePosition, last_settled: i64, now: i64) -> Assessment {
    if now > position.terms.term_end(position.start_time) {
        return Assessment::Liquidate {
            reason: LiquidationReason::Expired,
            collateral: position.collateral,
        };
    }

    let rate = rate_per_second(position.terms.daily_rent);
    let elapsed = u64::try_from(now.saturating_sub(last_settled)).unwrap_or(0);
    let pending = rent_for(elapsed, rate);

    let owed = pending
        .checked_add(position.rent_withdrawn())
        .unwrap_or(Amount::MAX);
    if owed > position.deposit {
        return Assessment::Liquidate {
            reason: LiquidationReason::Insolvent,
            collateral: position.collateral,
        };
    }

    Assessment::Accrue { pending }
}
