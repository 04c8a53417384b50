//! Error types for marketplace operations
//!
//! Every assembly entry point returns [`MarketError`]. Variants separate
//! caller mistakes (rejected before any I/O), missing prerequisite records,
//! custody and currency-account problems, and failures of the layers below.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::pda::DeriveError;
use crate::state::{DecodeError, ReadError};

#[derive(Error, Debug, Clone)]
pub enum MarketError {
    /// Caller input rejected before touching the ledger
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("No listing found for mint {mint}")]
    ListingNotFound { mint: Pubkey },

    #[error("No offer found for mint {mint} from buyer {buyer}")]
    OfferNotFound { mint: Pubkey, buyer: Pubkey },

    #[error("No auction found for mint {mint}")]
    AuctionNotFound { mint: Pubkey },

    /// The acting user does not hold the NFT and neither does the marketplace
    #[error("{user} does not own mint {mint} (holder owner: {holder:?})")]
    NotOwner {
        user: Pubkey,
        mint: Pubkey,
        holder: Option<Pubkey>,
    },

    /// The acting party has no token account for the marketplace currency
    #[error("{owner} has no token account for mint {mint}")]
    MissingTokenAccount { owner: Pubkey, mint: Pubkey },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Derive error: {0}")]
    Derive(#[from] DeriveError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Assembled instruction list failed its ordering check
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),
}

impl From<ReadError> for MarketError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Derive(e) => MarketError::Derive(e),
            ReadError::Ledger(e) => MarketError::Ledger(e),
            ReadError::Decode(e) => MarketError::Decode(e),
        }
    }
}

impl MarketError {
    /// Check if this error is potentially retryable
    ///
    /// Only ledger transport conditions qualify; every other variant reflects
    /// caller input or on-chain state that a retry would not change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            Self::InvalidArgument { .. } => false,
            Self::ListingNotFound { .. } => false,
            Self::OfferNotFound { .. } => false,
            Self::AuctionNotFound { .. } => false,
            Self::NotOwner { .. } => false,
            Self::MissingTokenAccount { .. } => false,
            Self::Decode(_) => false,
            Self::Derive(_) => false,
            Self::Config(_) => false,
            Self::InvalidInstructionOrder(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "argument",
            Self::ListingNotFound { .. }
            | Self::OfferNotFound { .. }
            | Self::AuctionNotFound { .. } => "not_found",
            Self::NotOwner { .. } => "custody",
            Self::MissingTokenAccount { .. } => "token_account",
            Self::Decode(_) => "decode",
            Self::Derive(_) => "derive",
            Self::Ledger(_) => "ledger",
            Self::Config(_) => "config",
            Self::InvalidInstructionOrder(_) => "validation",
        }
    }
}

// Convenience constructors for common error scenarios
impl MarketError {
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub fn negative_amount(name: &'static str, value: i64) -> Self {
        Self::invalid_argument(name, format!("must be non-negative, got {value}"))
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }
}

/// Convert a caller amount to the on-chain u64, rejecting negatives
pub fn non_negative(name: &'static str, value: i64) -> Result<u64, MarketError> {
    u64::try_from(value).map_err(|_| MarketError::negative_amount(name, value))
}
