//! # rent-market
//!
//! Peer-to-peer rental escrow engine for unique digital assets.
//!
//! A maker signs an off-chain [`RentalTerms`] intent. A taker accepts it by
//! posting collateral and receiving custody of the asset. The engine then
//! accrues rent against that collateral, lets the maker withdraw earned rent,
//! and ends the position either cooperatively (asset returned, remainder
//! refunded) or by liquidation (collateral forfeited to the maker).
//!
//! This crate provides:
//!
//! - Intent digests and signer recovery ([`authorization`])
//! - Cancellation and active-position bookkeeping ([`registry`])
//! - Rent accrual and liquidation checks ([`accrual`])
//! - The four lifecycle entry points plus reclaim ([`market`])
//!
//! Liquidation is evaluated lazily: an overdue position stays active until the
//! maker or taker next touches it. No background sweep exists.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accrual;
pub mod authorization;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod market;
pub mod registry;
pub mod terms;

pub use accrual::{
    assess, rate_per_second, rent_for, Assessment, LiquidationReason, PRECISION, SECONDS_PER_DAY,
};
pub use authorization::{Digest, Ed25519Recovery, IntentSignature, OrderAuthority, SignerRecovery};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MarketConfig;
pub use error::MarketError;
pub use events::{EventSink, MemoryEventSink, RentalEvent, TracingEventSink};
pub use ledger::{AssetCustody, InMemoryBank, InMemoryCustody, Payout, ValueTransfer};
pub use market::{RentalMarket, ReturnOutcome, WithdrawOutcome};
pub use registry::{ActivePosition, OrderRegistry, Reclaim};
pub use terms::{AssetId, RentalTerms};
