//! Ledger read/query service
//!
//! Everything the marketplace client needs from the chain goes through
//! [`LedgerClient`]: raw account bytes, filtered program-account scans, and
//! the two token-account lookups used for currency fallback and NFT custody.
//!
//! ## Implementations
//! - [`RpcLedger`]: JSON-RPC over `solana-client`'s nonblocking client
//! - `test_utils::MockLedger`: in-memory, for tests

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

pub mod ledger_errors;
pub mod rpc_ledger;

pub use ledger_errors::LedgerError;
pub use rpc_ledger::RpcLedger;

/// Server-side filter for program-account scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Account data length in bytes
    DataSize(u64),
    /// Raw bytes at an offset within account data
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    pub fn memcmp_address(offset: usize, address: &Pubkey) -> Self {
        AccountFilter::Memcmp {
            offset,
            bytes: address.to_bytes().to_vec(),
        }
    }

    /// Local evaluation, matching the server's semantics
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            AccountFilter::DataSize(size) => data.len() as u64 == *size,
            AccountFilter::Memcmp { offset, bytes } => data
                .get(*offset..offset.saturating_add(bytes.len()))
                .is_some_and(|window| window == bytes.as_slice()),
        }
    }
}

/// One entry of a mint's largest-holders list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHolding {
    pub address: Pubkey,
    pub amount: u64,
}

/// Read-only access to ledger state
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Raw account data, `None` when the account does not exist
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    /// All accounts owned by `program_id` passing every filter
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, LedgerError>;

    /// Token accounts of `owner` holding `mint`
    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<Pubkey>, LedgerError>;

    /// Largest holders of `mint`, biggest first
    async fn get_token_largest_accounts(
        &self,
        mint: &Pubkey,
    ) -> Result<Vec<TokenHolding>, LedgerError>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, LedgerError> {
        Ok(self.get_account_data(address).await?.is_some())
    }
}
