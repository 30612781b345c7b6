//! # rent-core
//!
//! Value and identity primitives for the peer-to-peer rental escrow engine.
//!
//! This crate provides:
//!
//! - [`Amount`] — Value units with fixed-point precision
//! - [`Address`] — Participant identity (an Ed25519 public key)
//! - [`Wallet`] — Maker keypair used to sign rental intents
//! - [`Signature`] — Detached signature carried alongside an intent

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod error;
pub mod wallet;

pub use amount::Amount;
pub use error::CoreError;
pub use wallet::{Address, Signature, Wallet};
