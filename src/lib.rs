//! Client-side protocol engine for a Solana NFT marketplace
//!
//! Derives the program's record addresses, decodes its on-chain records and
//! assembles ready-to-sign instruction bundles for every marketplace
//! operation. Signing and submission stay with the caller.

pub mod config;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod pda;
pub mod resolver;
pub mod state;
pub mod structured_logging;
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use config::MarketConfig;
pub use ledger::{AccountFilter, LedgerClient, LedgerError, RpcLedger};
pub use market::{InstructionBundle, MarketClient, MarketError, MarketOperation};
pub use pda::MarketAddresses;
pub use state::{DiscriminatorPolicy, RecordKind, StateReader};

pub use solana_sdk::pubkey::Pubkey;
