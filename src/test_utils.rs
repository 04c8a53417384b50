//! Test Utilities Module
//!
//! In-memory ledger for deterministic tests of the reader, resolver and
//! assembler. Nothing here touches the network.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, AccountState};
use tokio::sync::Mutex;

use crate::ledger::{AccountFilter, LedgerClient, LedgerError, TokenHolding};
use crate::resolver::{parse_token_account, TokenAccountView};

/// Packed bytes of an initialized SPL token account
pub fn token_account_data(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
    let account = TokenAccount {
        mint: *mint,
        owner: *owner,
        amount,
        state: AccountState::Initialized,
        ..TokenAccount::default()
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(account, &mut data).expect("buffer is exactly Account::LEN");
    data
}

#[derive(Debug, Clone)]
struct StoredAccount {
    program_owner: Pubkey,
    data: Vec<u8>,
}

/// Mock ledger for testing
///
/// Accounts are kept in a map keyed by address, tagged with the program that
/// owns them. Token accounts are ordinary entries owned by the token program,
/// so the token lookups are answered from the same map.
#[derive(Clone, Default)]
pub struct MockLedger {
    accounts: Arc<Mutex<HashMap<Pubkey, StoredAccount>>>,

    /// Method names of every query, in call order
    pub calls: Arc<Mutex<Vec<&'static str>>>,

    /// When set, every query fails with this error
    pub failure: Arc<Mutex<Option<LedgerError>>>,

    /// Largest-holder answers that bypass the stored token accounts
    largest_overrides: Arc<Mutex<HashMap<Pubkey, Vec<TokenHolding>>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a raw account
    pub async fn set_account(&self, address: Pubkey, program_owner: Pubkey, data: Vec<u8>) {
        self.accounts.lock().await.insert(
            address,
            StoredAccount {
                program_owner,
                data,
            },
        );
    }

    pub async fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().await.remove(address);
    }

    /// Insert or replace a token account
    pub async fn add_token_account(&self, address: Pubkey, mint: &Pubkey, owner: &Pubkey, amount: u64) {
        self.set_account(address, spl_token::id(), token_account_data(mint, owner, amount))
            .await;
    }

    /// Answer `get_token_largest_accounts(mint)` with `holdings` verbatim
    pub async fn set_largest_accounts(&self, mint: Pubkey, holdings: Vec<TokenHolding>) {
        self.largest_overrides.lock().await.insert(mint, holdings);
    }

    pub async fn set_failure(&self, failure: Option<LedgerError>) {
        *self.failure.lock().await = failure;
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn recorded_calls(&self) -> Vec<&'static str> {
        self.calls.lock().await.clone()
    }

    pub async fn reset_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, method: &'static str) -> Result<(), LedgerError> {
        self.calls.lock().await.push(method);
        match self.failure.lock().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn token_accounts(&self) -> Vec<(Pubkey, TokenAccountView)> {
        let token_program = spl_token::id();
        self.accounts
            .lock()
            .await
            .iter()
            .filter(|(_, stored)| stored.program_owner == token_program)
            .filter_map(|(address, stored)| {
                parse_token_account(&stored.data).ok().map(|view| (*address, view))
            })
            .collect()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        self.record("get_account_data").await?;
        Ok(self
            .accounts
            .lock()
            .await
            .get(address)
            .map(|stored| stored.data.clone()))
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, LedgerError> {
        self.record("get_program_accounts").await?;
        let mut matched: Vec<_> = self
            .accounts
            .lock()
            .await
            .iter()
            .filter(|(_, stored)| stored.program_owner == *program_id)
            .filter(|(_, stored)| filters.iter().all(|f| f.matches(&stored.data)))
            .map(|(address, stored)| (*address, stored.data.clone()))
            .collect();
        matched.sort_by_key(|(address, _)| *address);
        Ok(matched)
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<Pubkey>, LedgerError> {
        self.record("get_token_accounts_by_owner").await?;
        let mut found: Vec<_> = self
            .token_accounts()
            .await
            .into_iter()
            .filter(|(_, view)| view.owner == *owner && view.mint == *mint)
            .map(|(address, _)| address)
            .collect();
        found.sort();
        Ok(found)
    }

    async fn get_token_largest_accounts(
        &self,
        mint: &Pubkey,
    ) -> Result<Vec<TokenHolding>, LedgerError> {
        self.record("get_token_largest_accounts").await?;
        if let Some(holdings) = self.largest_overrides.lock().await.get(mint) {
            return Ok(holdings.clone());
        }
        let mut holdings: Vec<_> = self
            .token_accounts()
            .await
            .into_iter()
            .filter(|(_, view)| view.mint == *mint)
            .map(|(address, view)| TokenHolding {
                address,
                amount: view.amount,
            })
            .collect();
        holdings.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.address.cmp(&b.address)));
        Ok(holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_ledger_records_calls() {
        let ledger = MockLedger::new();
        let address = Pubkey::new_unique();
        assert_eq!(ledger.get_account_data(&address).await.unwrap(), None);

        ledger.set_account(address, Pubkey::new_unique(), vec![1, 2, 3]).await;
        assert_eq!(
            ledger.get_account_data(&address).await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(ledger.call_count().await, 2);

        ledger.reset_calls().await;
        assert_eq!(ledger.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_ledger_failure_injection() {
        let ledger = MockLedger::new();
        ledger
            .set_failure(Some(LedgerError::Timeout {
                endpoint: "mock".to_string(),
                timeout_ms: 1,
            }))
            .await;
        assert!(ledger.get_account_data(&Pubkey::new_unique()).await.is_err());
        assert_eq!(ledger.recorded_calls().await, vec!["get_account_data"]);
    }

    #[tokio::test]
    async fn test_mock_ledger_token_queries() {
        let ledger = MockLedger::new();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let small = Pubkey::new_unique();
        let large = Pubkey::new_unique();
        ledger.add_token_account(small, &mint, &owner, 1).await;
        ledger.add_token_account(large, &mint, &Pubkey::new_unique(), 50).await;

        let largest = ledger.get_token_largest_accounts(&mint).await.unwrap();
        assert_eq!(largest[0].address, large);
        assert_eq!(largest[1].amount, 1);

        let owned = ledger.get_token_accounts_by_owner(&owner, &mint).await.unwrap();
        assert_eq!(owned, vec![small]);
    }

    #[tokio::test]
    async fn test_mock_ledger_program_filters() {
        let ledger = MockLedger::new();
        let program = Pubkey::new_unique();
        ledger.set_account(Pubkey::new_unique(), program, vec![0; 10]).await;
        ledger.set_account(Pubkey::new_unique(), program, vec![0; 12]).await;
        ledger.set_account(Pubkey::new_unique(), Pubkey::new_unique(), vec![0; 10]).await;

        let hits = ledger
            .get_program_accounts(&program, &[AccountFilter::DataSize(10)])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
