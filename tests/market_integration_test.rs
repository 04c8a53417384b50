//! Integration tests for the public marketplace API
//!
//! This test validates:
//! - A custom `LedgerClient` implementation plugs into `MarketClient`
//! - Records placed at derived addresses are read back and acted on
//! - Bundles compile into an unsigned message for the payer
//! - Configuration drives the client's deployment addresses

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use market_client::ledger::TokenHolding;
use market_client::state::{AccountRecord, SellData};
use market_client::{
    AccountFilter, DiscriminatorPolicy, LedgerClient, LedgerError, MarketClient, MarketConfig,
    MarketError, MarketOperation,
};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::RwLock;

/// Program-account store without token-account support
#[derive(Default)]
struct StaticLedger {
    accounts: RwLock<HashMap<Pubkey, (Pubkey, Vec<u8>)>>,
}

impl StaticLedger {
    async fn insert(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.write().await.insert(address, (owner, data));
    }
}

#[async_trait]
impl LedgerClient for StaticLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.accounts.read().await.get(address).map(|(_, data)| data.clone()))
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, LedgerError> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .filter(|(_, (owner, data))| owner == program_id && filters.iter().all(|f| f.matches(data)))
            .map(|(address, (_, data))| (*address, data.clone()))
            .collect())
    }

    async fn get_token_accounts_by_owner(
        &self,
        _owner: &Pubkey,
        _mint: &Pubkey,
    ) -> Result<Vec<Pubkey>, LedgerError> {
        Ok(Vec::new())
    }

    async fn get_token_largest_accounts(&self, _mint: &Pubkey) -> Result<Vec<TokenHolding>, LedgerError> {
        Ok(Vec::new())
    }
}

fn client(ledger: Arc<StaticLedger>) -> MarketClient<StaticLedger> {
    MarketClient::from_config(ledger, &MarketConfig::default()).unwrap()
}

#[tokio::test]
async fn test_purchase_against_custom_ledger() {
    let ledger = Arc::new(StaticLedger::default());
    let market = client(Arc::clone(&ledger));
    let seller = Pubkey::new_unique();
    let buyer = Pubkey::new_unique();
    let mint = Pubkey::new_unique();

    let listing = SellData {
        mint,
        seller,
        collection: Pubkey::new_unique(),
        price_sol: 1_000_000_000,
        price_token: 0,
        listed_date: 1_700_000_000,
        active: true,
    };
    let address = market.addresses().sell_data(&mint).unwrap().address;
    ledger.insert(address, market.program_id(), listing.encode()).await;

    let read = market.get_sell_data(&mint).await.unwrap().unwrap();
    assert_eq!(read, listing);

    let bundle = market.purchase(&buyer, &mint, false, &[]).await.unwrap();
    // Buyer currency, buyer NFT and seller currency are all missing
    assert_eq!(bundle.bootstrap_count(), 3);
    assert_eq!(bundle.operation, MarketOperation::Purchase);

    let message = bundle.message();
    assert_eq!(message.account_keys[0], buyer);
    assert_eq!(message.header.num_required_signatures, 1);
    assert_eq!(message.instructions.len(), 4);
}

#[tokio::test]
async fn test_listing_requires_a_holder() {
    let ledger = Arc::new(StaticLedger::default());
    let market = client(ledger);
    let result = market
        .list_nft_for_sale(&Pubkey::new_unique(), &Pubkey::new_unique(), 10, 0)
        .await;
    assert!(matches!(result, Err(MarketError::NotOwner { holder: None, .. })));
}

#[tokio::test]
async fn test_scan_on_custom_ledger() {
    let ledger = Arc::new(StaticLedger::default());
    let market = client(Arc::clone(&ledger));
    let mint = Pubkey::new_unique();
    let listing = SellData {
        mint,
        seller: Pubkey::new_unique(),
        collection: Pubkey::default(),
        price_sol: 5,
        price_token: 6,
        listed_date: 0,
        active: true,
    };
    let address = market.addresses().sell_data(&mint).unwrap().address;
    ledger.insert(address, market.program_id(), listing.encode()).await;

    let scan = market.scan_listings().await.unwrap();
    assert_eq!(scan.records, vec![listing]);
}

#[test]
fn test_config_drives_program_id() {
    let mut config = MarketConfig::default();
    let program_id = Pubkey::new_unique();
    config.program.program_id = program_id.to_string();
    config.decoder.discriminator_policy = DiscriminatorPolicy::Verify;

    let market = MarketClient::from_config(Arc::new(StaticLedger::default()), &config).unwrap();
    assert_eq!(market.program_id(), program_id);
    assert_eq!(market.addresses().program_id(), program_id);
}

#[tokio::test]
async fn test_summary_is_json() {
    let market = client(Arc::new(StaticLedger::default()));
    let admin = Pubkey::new_unique();
    let bundle = market.update_fee(&admin, 250, 150).await.unwrap();
    let json = serde_json::to_string(&bundle.summary()).unwrap();
    assert!(json.contains("\"operation\":\"updateFee\""));
    assert!(json.contains(&admin.to_string()));
}
