//! Lifecycle entry points.
//!
//! Per listing digest: `Listed → Active → {Settled | Liquidated}`, with
//! `Listed → Cancelled` as a side branch. Every operation follows the same
//! order: authorize, read the registry, assess, transfer, and only then
//! persist. A failure at any step returns before the registry is touched.
//! Every custody and value effect is prechecked read-only before the first
//! one runs, and payouts go last, so a refused effect never leaves value
//! moved for an operation that did not complete.
//!
//! Liquidation is reactive. It is only evaluated when the maker withdraws
//! rent or the taker returns the asset; an overdue position nobody touches
//! stays active.

use rent_core::{Address, Amount};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::accrual::{self, Assessment, LiquidationReason};
use crate::authorization::{Digest, IntentSignature, OrderAuthority, SignerRecovery};
use crate::clock::Clock;
use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::events::{EventSink, RentalEvent, TracingEventSink};
use crate::ledger::{AssetCustody, Payout, ValueTransfer};
use crate::registry::{ActivePosition, OrderRegistry, Reclaim};
use crate::terms::RentalTerms;

/// Result of [`RentalMarket::return_asset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnOutcome {
    /// Asset returned, rent paid, remainder refunded.
    Settled {
        /// Unsettled rent paid to the maker.
        rent_paid: Amount,
        /// Collateral refunded to the taker.
        refund: Amount,
    },
    /// Collateral forfeited; the asset awaits [`RentalMarket::reclaim`].
    Liquidated {
        /// Trigger.
        reason: LiquidationReason,
        /// Collateral paid to the maker.
        collateral: Amount,
    },
}

/// Result of [`RentalMarket::withdraw_rent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawOutcome {
    /// Rent paid; the position stays active.
    Paid(Amount),
    /// Collateral forfeited; the asset awaits [`RentalMarket::reclaim`].
    Liquidated {
        /// Trigger.
        reason: LiquidationReason,
        /// Collateral paid to the maker.
        collateral: Amount,
    },
}

/// The rental escrow engine.
///
/// Owns its registry and collaborators. `&mut self` on every mutating entry
/// point serializes operations; separate markets share nothing.
pub struct RentalMarket<C, V, K> {
    config: MarketConfig,
    authority: OrderAuthority,
    registry: OrderRegistry,
    custody: C,
    bank: V,
    clock: K,
    sink: Box<dyn EventSink>,
    events: Vec<RentalEvent>,
}

impl<C, V, K> RentalMarket<C, V, K>
where
    C: AssetCustody,
    V: ValueTransfer,
    K: Clock,
{
    /// Creates a market with an empty registry.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::InvalidConfig` if `config` fails validation.
    pub fn new(config: MarketConfig, custody: C, bank: V, clock: K) -> Result<Self, MarketError> {
        config.validate()?;
        let authority = OrderAuthority::new(&config);
        info!(
            market = %config.market,
            instance = %config.instance_id,
            domain = %authority.domain_separator(),
            "rental market initialized"
        );
        Ok(Self {
            config,
            authority,
            registry: OrderRegistry::new(),
            custody,
            bank,
            clock,
            sink: Box::new(TracingEventSink),
            events: Vec::new(),
        })
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the signer recovery.
    #[must_use]
    pub fn with_signer_recovery(mut self, recovery: Box<dyn SignerRecovery>) -> Self {
        self.authority = OrderAuthority::with_recovery(&self.config, recovery);
        self
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Accepts a signed listing: collects `deposit` from `caller` and moves
    /// the asset from the maker to `caller`.
    ///
    /// # Errors
    ///
    /// `Expired`, `InsufficientDeposit`, `Cancelled`, `InvalidSignature`,
    /// `Unauthorized`, `AlreadyActive`, `CustodyTransferDenied`,
    /// `ValueTransferFailed`.
    pub fn accept(
        &mut self,
        terms: &RentalTerms,
        signature: &IntentSignature,
        deposit: Amount,
        caller: Address,
    ) -> Result<Digest, MarketError> {
        let now = self.clock.now();
        if !terms.is_listed_at(now) {
            return Err(MarketError::Expired {
                expiry: terms.listing_expiry,
                now,
            });
        }
        if deposit < terms.min_collateral {
            return Err(MarketError::InsufficientDeposit {
                required: terms.min_collateral,
                offered: deposit,
            });
        }

        let digest = self.authority.digest(terms);
        if self.registry.is_cancelled(&digest) {
            return Err(MarketError::Cancelled(digest));
        }
        self.authority.authorize(terms, signature)?;
        if self.registry.is_occupied(&digest) {
            return Err(MarketError::AlreadyActive(digest));
        }
        self.custody
            .check_transfer(self.config.market, &terms.asset, terms.maker)?;

        self.bank.collect(caller, deposit)?;
        if let Err(e) =
            self.custody
                .transfer(self.config.market, &terms.asset, terms.maker, caller)
        {
            // Custody changed between check and transfer; hand the deposit back.
            if let Err(refund) = self.bank.pay(caller, deposit) {
                warn!(%digest, error = %refund, "failed to return deposit after custody refusal");
            }
            return Err(e);
        }

        self.registry
            .open(digest, ActivePosition::new(caller, deposit, now, terms.clone()))?;
        info!(%digest, taker = %caller, collateral = %deposit, "listing accepted");
        self.emit(RentalEvent::Accepted {
            taker: caller,
            maker: terms.maker,
            digest,
            collateral: deposit,
        });
        Ok(digest)
    }

    /// Permanently bars a listing from acceptance.
    ///
    /// The caller must be the maker, proven by the maker's signature over the
    /// listing. An active position under the same digest is unaffected.
    ///
    /// # Errors
    ///
    /// `InvalidSignature`, `Unauthorized`, `AlreadyCancelled`.
    pub fn cancel(
        &mut self,
        terms: &RentalTerms,
        signature: &IntentSignature,
        caller: Address,
    ) -> Result<Digest, MarketError> {
        let digest = self.authority.authorize(terms, signature)?;
        if caller != terms.maker {
            return Err(MarketError::Unauthorized(format!(
                "{caller} is not the maker of {digest}"
            )));
        }
        self.registry.cancel(digest)?;

        info!(%digest, maker = %caller, "listing cancelled");
        self.emit(RentalEvent::Cancelled {
            maker: caller,
            digest,
        });
        Ok(digest)
    }

    /// Ends a position at the taker's request.
    ///
    /// A healthy position pays pending rent to the maker, moves the asset
    /// back, and refunds the rest of the collateral. An expired or insolvent
    /// one is liquidated instead.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Unauthorized`, `CustodyTransferDenied`,
    /// `ValueTransferFailed`.
    pub fn return_asset(
        &mut self,
        digest: &Digest,
        caller: Address,
    ) -> Result<ReturnOutcome, MarketError> {
        let (position, last_settled) = self.active(digest)?;
        if caller != position.taker {
            return Err(MarketError::Unauthorized(format!(
                "{caller} is not the taker of {digest}"
            )));
        }

        let now = self.clock.now();
        let pending = match accrual::assess(&position, last_settled, now) {
            Assessment::Liquidate { reason, collateral } => {
                self.liquidate(digest, &position, reason, collateral)?;
                return Ok(ReturnOutcome::Liquidated { reason, collateral });
            }
            Assessment::Accrue { pending } => pending,
        };

        // Healthy means pending + withdrawn <= deposit, so this cannot fail.
        let refund = position
            .collateral
            .checked_sub(pending)
            .ok_or(MarketError::Arithmetic("pending rent exceeds collateral"))?;
        debug!(%digest, %pending, %refund, "settling position");

        let payouts = [
            Payout {
                to: position.terms.maker,
                amount: pending,
            },
            Payout {
                to: position.taker,
                amount: refund,
            },
        ];
        self.custody
            .check_transfer(self.config.market, &position.terms.asset, position.taker)?;
        self.bank.check_payouts(&payouts)?;

        // The asset moves first: a refused transfer leaves nothing paid out.
        self.custody.transfer(
            self.config.market,
            &position.terms.asset,
            position.taker,
            position.terms.maker,
        )?;
        if let Err(e) = self.bank.pay_all(&payouts) {
            error!(%digest, error = %e, "payout refused after the asset was returned");
            return Err(e);
        }

        self.registry.close(digest);
        info!(%digest, taker = %caller, rent = %pending, %refund, "asset returned");
        self.emit(RentalEvent::Returned {
            digest: *digest,
            taker: caller,
        });
        Ok(ReturnOutcome::Settled {
            rent_paid: pending,
            refund,
        })
    }

    /// Pays the maker the rent accrued since the last withdrawal.
    ///
    /// Liquidates instead if the position has expired or become insolvent.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Unauthorized`, `ValueTransferFailed`.
    pub fn withdraw_rent(
        &mut self,
        digest: &Digest,
        caller: Address,
    ) -> Result<WithdrawOutcome, MarketError> {
        let (position, last_settled) = self.active(digest)?;
        if caller != position.terms.maker {
            return Err(MarketError::Unauthorized(format!(
                "{caller} is not the maker of {digest}"
            )));
        }

        let now = self.clock.now();
        let pending = match accrual::assess(&position, last_settled, now) {
            Assessment::Liquidate { reason, collateral } => {
                self.liquidate(digest, &position, reason, collateral)?;
                return Ok(WithdrawOutcome::Liquidated { reason, collateral });
            }
            Assessment::Accrue { pending } => pending,
        };

        let payout = [Payout {
            to: caller,
            amount: pending,
        }];
        self.bank.check_payouts(&payout)?;
        self.bank.pay_all(&payout)?;
        self.registry.record_withdrawal(digest, now, pending)?;

        info!(%digest, maker = %caller, amount = %pending, "rent withdrawn");
        self.emit(RentalEvent::RentWithdrawn {
            digest: *digest,
            maker: caller,
            amount: pending,
        });
        Ok(WithdrawOutcome::Paid(pending))
    }

    /// Moves a liquidated asset from the former taker back to the maker.
    ///
    /// Requires the taker's custody approval for the market.
    ///
    /// # Errors
    ///
    /// `NotReclaimable`, `Unauthorized`, `CustodyTransferDenied`.
    pub fn reclaim(&mut self, digest: &Digest, caller: Address) -> Result<(), MarketError> {
        let reclaim = self
            .registry
            .reclaim(digest)
            .cloned()
            .ok_or(MarketError::NotReclaimable(*digest))?;
        if caller != reclaim.maker {
            return Err(MarketError::Unauthorized(format!(
                "{caller} is not the maker of {digest}"
            )));
        }

        self.custody
            .transfer(self.config.market, &reclaim.asset, reclaim.taker, reclaim.maker)?;
        self.registry.clear_reclaim(digest);

        info!(%digest, maker = %caller, asset = %reclaim.asset, "asset reclaimed");
        self.emit(RentalEvent::Reclaimed {
            digest: *digest,
            maker: caller,
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Read accessors
    // ---------------------------------------------------------------------

    /// Active position under `digest`.
    #[must_use]
    pub fn position(&self, digest: &Digest) -> Option<&ActivePosition> {
        self.registry.position(digest)
    }

    /// True if the listing was cancelled.
    #[must_use]
    pub fn is_cancelled(&self, digest: &Digest) -> bool {
        self.registry.is_cancelled(digest)
    }

    /// Time of the last rent settlement for an active position.
    #[must_use]
    pub fn last_settled(&self, digest: &Digest) -> Option<i64> {
        self.registry.last_settled(digest)
    }

    /// Liquidated asset awaiting reclaim.
    #[must_use]
    pub fn outstanding_reclaim(&self, digest: &Digest) -> Option<&Reclaim> {
        self.registry.reclaim(digest)
    }

    /// Digest of `terms` on this engine.
    #[must_use]
    pub fn digest_of(&self, terms: &RentalTerms) -> Digest {
        self.authority.digest(terms)
    }

    /// This engine's domain-separation hash.
    #[must_use]
    pub const fn domain_separator(&self) -> Digest {
        self.authority.domain_separator()
    }

    /// What settling `digest` would do right now, without doing it.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing is active.
    pub fn quote(&self, digest: &Digest) -> Result<Assessment, MarketError> {
        let (position, last_settled) = self.active(digest)?;
        Ok(accrual::assess(&position, last_settled, self.clock.now()))
    }

    /// Every event emitted so far, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RentalEvent] {
        &self.events
    }

    /// Underlying registry.
    #[must_use]
    pub const fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Custody collaborator.
    #[must_use]
    pub const fn custody(&self) -> &C {
        &self.custody
    }

    /// Mutable custody collaborator (e.g. for owners granting approval).
    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    /// Value collaborator.
    #[must_use]
    pub const fn bank(&self) -> &V {
        &self.bank
    }

    /// Mutable value collaborator.
    pub fn bank_mut(&mut self) -> &mut V {
        &mut self.bank
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn active(&self, digest: &Digest) -> Result<(ActivePosition, i64), MarketError> {
        let position = self
            .registry
            .position(digest)
            .cloned()
            .ok_or(MarketError::NotFound(*digest))?;
        let last_settled = self
            .registry
            .last_settled(digest)
            .unwrap_or(position.start_time);
        Ok((position, last_settled))
    }

    // Pays all remaining collateral to the maker, closes the position and
    // leaves the asset with the taker pending reclaim.
    fn liquidate(
        &mut self,
        digest: &Digest,
        position: &ActivePosition,
        reason: LiquidationReason,
        collateral: Amount,
    ) -> Result<(), MarketError> {
        let payout = [Payout {
            to: position.terms.maker,
            amount: collateral,
        }];
        self.bank.check_payouts(&payout)?;
        self.bank.pay_all(&payout)?;

        self.registry.close(digest);
        self.registry.record_reclaim(
            *digest,
            Reclaim {
                asset: position.terms.asset,
                taker: position.taker,
                maker: position.terms.maker,
            },
        );

        warn!(
            %digest,
            taker = %position.taker,
            %collateral,
            ?reason,
            "position liquidated"
        );
        self.emit(RentalEvent::Liquidated {
            digest: *digest,
            taker: position.taker,
            collateral,
        });
        Ok(())
    }

    fn emit(&mut self, event: RentalEvent) {
        self.sink.record(&event);
        self.events.push(event);
    }
}

impl<C, V, K> std::fmt::Debug for RentalMarket<C, V, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentalMarket")
            .field("market", &self.config.market)
            .field("active", &self.registry.active_count())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}
