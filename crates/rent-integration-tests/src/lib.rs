//! Integration test crate for the rental escrow engine.
//!
//! This crate exists solely to run end-to-end scenarios across `rent-core` and
//! `rent-market`. It has no public API - all functionality is in the test
//! modules.

#![forbid(unsafe_code)]
