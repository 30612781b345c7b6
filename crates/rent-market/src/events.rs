//! Records emitted on every state transition.
//!
//! The market keeps an append-only log of [`RentalEvent`]s and forwards each
//! one to an [`EventSink`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rent_core::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::authorization::Digest;

/// A state transition of one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RentalEvent {
    /// A taker accepted a listing.
    Accepted {
        /// New holder.
        taker: Address,
        /// Owner.
        maker: Address,
        /// Listing.
        digest: Digest,
        /// Collateral posted.
        collateral: Amount,
    },
    /// A maker revoked a listing.
    Cancelled {
        /// Owner.
        maker: Address,
        /// Listing.
        digest: Digest,
    },
    /// The taker returned the asset and the position settled.
    Returned {
        /// Listing.
        digest: Digest,
        /// Former holder.
        taker: Address,
    },
    /// The maker withdrew accrued rent.
    RentWithdrawn {
        /// Listing.
        digest: Digest,
        /// Owner.
        maker: Address,
        /// Amount paid.
        amount: Amount,
    },
    /// Collateral was forfeited to the maker.
    Liquidated {
        /// Listing.
        digest: Digest,
        /// Holder who forfeited.
        taker: Address,
        /// Collateral paid to the maker.
        collateral: Amount,
    },
    /// The maker pulled a liquidated asset back.
    Reclaimed {
        /// Listing.
        digest: Digest,
        /// Owner.
        maker: Address,
    },
}

impl RentalEvent {
    /// Short event name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Cancelled { .. } => "cancelled",
            Self::Returned { .. } => "returned",
            Self::RentWithdrawn { .. } => "rent_withdrawn",
            Self::Liquidated { .. } => "liquidated",
            Self::Reclaimed { .. } => "reclaimed",
        }
    }

    /// Listing the event belongs to.
    #[must_use]
    pub const fn digest(&self) -> &Digest {
        match self {
            Self::Accepted { digest, .. }
            | Self::Cancelled { digest, .. }
            | Self::Returned { digest, .. }
            | Self::RentWithdrawn { digest, .. }
            | Self::Liquidated { digest, .. }
            | Self::Reclaimed { digest, .. } => digest,
        }
    }
}

impl fmt::Display for RentalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.digest())
    }
}

/// Destination for emitted events.
pub trait EventSink: Send + Sync {
    /// Receives one event.
    fn record(&self, event: &RentalEvent);
}

/// Writes events through `tracing` under the `rent_market::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: &RentalEvent) {
        let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
        match event {
            RentalEvent::Liquidated { .. } => tracing::warn!(
                target: "rent_market::events",
                kind = event.kind(),
                digest = %event.digest(),
                event_json = %json,
                "rental event"
            ),
            _ => tracing::info!(
                target: "rent_market::events",
                kind = event.kind(),
                digest = %event.digest(),
                event_json = %json,
                "rental event"
            ),
        }
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<RentalEvent>>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<RentalEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &RentalEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> RentalEvent {
        RentalEvent::Cancelled {
            maker: Address::from_bytes([1; 32]),
            digest: Digest::from_bytes([2; 32]),
        }
    }

    #[test]
    fn memory_sink_clones_share_buffer() {
        let sink = MemoryEventSink::new();
        let handle = sink.clone();
        handle.record(&event());
        assert_eq!(sink.events(), vec![event()]);
    }

    #[test]
    fn event_json_is_tagged() {
        let json = serde_json::to_value(event()).expect("serialize");
        assert_eq!(json["type"], "cancelled");
        let back: RentalEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event());
    }

    #[test]
    fn display_names_kind_and_digest() {
        let shown = event().to_string();
        assert!(shown.starts_with("cancelled 0202"));
    }

    #[test]
    fn tracing_sink_does_not_panic_without_subscriber() {
        TracingEventSink.record(&event());
    }
}
