//! Marketplace transaction assembly
//!
//! One async entry point per program instruction. Each derives its record
//! addresses, reads whatever state it branches on, resolves the token
//! accounts it touches and returns an [`InstructionBundle`] with any account
//! creations ahead of the program instruction.
//!
//! ## Key Features
//! - Caller amounts validated before any ledger access
//! - Independent ledger reads issued concurrently
//! - Counterparty recovered from listing, offer or auction records
//! - Treasury fan-out converted to token accounts for token-priced trades
//! - Per-assembly structured logs and optional Prometheus counters

pub mod errors;
pub mod instructions;
pub mod output;

mod admin;
mod auction;
mod client;
mod escrow;
mod listing;
mod offer;

pub use client::MarketClient;
pub use errors::MarketError;
pub use instructions::{sanity_check_ix_order, MarketOperation};
pub use output::{BundleSummary, InstructionBundle};
