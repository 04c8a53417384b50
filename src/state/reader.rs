use std::sync::Arc;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument, warn};

use super::layout::{DecodeError, DiscriminatorPolicy, RecordKind};
use super::records::{
    decode_record, AccountRecord, AuctionData, GlobalPool, OfferData, SellData, UserData,
};
use crate::ledger::{AccountFilter, LedgerClient, LedgerError};
use crate::metrics::MarketMetrics;
use crate::pda::{DeriveError, MarketAddresses};

/// Failures of a point lookup or scan
#[derive(thiserror::Error, Debug, Clone)]
pub enum ReadError {
    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Outcome of a bulk scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult<T> {
    pub records: Vec<T>,
    /// Accounts the ledger returned
    pub total_seen: usize,
    /// Accounts that failed to decode
    pub dropped: usize,
}

impl<T> ScanResult<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Point lookups and bulk scans over marketplace records
pub struct StateReader<L: LedgerClient> {
    ledger: Arc<L>,
    addresses: MarketAddresses,
    policy: DiscriminatorPolicy,
    metrics: Option<Arc<MarketMetrics>>,
}

impl<L: LedgerClient> Clone for StateReader<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            addresses: self.addresses,
            policy: self.policy,
            metrics: self.metrics.clone(),
        }
    }
}

impl<L: LedgerClient> StateReader<L> {
    pub fn new(ledger: Arc<L>, addresses: MarketAddresses, policy: DiscriminatorPolicy) -> Self {
        Self {
            ledger,
            addresses,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MarketMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn addresses(&self) -> &MarketAddresses {
        &self.addresses
    }

    async fn fetch<T: AccountRecord>(&self, address: &Pubkey) -> Result<Option<T>, ReadError> {
        match self.ledger.get_account_data(address).await? {
            Some(blob) => Ok(Some(decode_record::<T>(&blob, self.policy)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_global_pool(&self) -> Result<Option<GlobalPool>, ReadError> {
        let global = self.addresses.global_authority()?;
        self.fetch(&global.address).await
    }

    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn get_user_data(&self, owner: &Pubkey) -> Result<Option<UserData>, ReadError> {
        let user = self.addresses.user_data(owner)?;
        self.fetch(&user.address).await
    }

    #[instrument(skip(self), fields(mint = %mint))]
    pub async fn get_sell_data(&self, mint: &Pubkey) -> Result<Option<SellData>, ReadError> {
        let sell = self.addresses.sell_data(mint)?;
        self.fetch(&sell.address).await
    }

    #[instrument(skip(self), fields(mint = %mint, buyer = %buyer))]
    pub async fn get_offer_data(
        &self,
        mint: &Pubkey,
        buyer: &Pubkey,
    ) -> Result<Option<OfferData>, ReadError> {
        let offer = self.addresses.offer_data(mint, buyer)?;
        self.fetch(&offer.address).await
    }

    #[instrument(skip(self), fields(mint = %mint))]
    pub async fn get_auction_data(&self, mint: &Pubkey) -> Result<Option<AuctionData>, ReadError> {
        let auction = self.addresses.auction_data(mint)?;
        self.fetch(&auction.address).await
    }

    async fn scan<T: AccountRecord>(
        &self,
        mut filters: Vec<AccountFilter>,
    ) -> Result<ScanResult<T>, ReadError> {
        let kind = T::KIND;
        if let Some(len) = kind.account_len() {
            filters.insert(0, AccountFilter::DataSize(len as u64));
        }
        let accounts = self
            .ledger
            .get_program_accounts(&self.addresses.program_id(), &filters)
            .await?;

        let total_seen = accounts.len();
        let mut records = Vec::with_capacity(total_seen);
        let mut dropped = 0;
        for (address, blob) in accounts {
            match decode_record::<T>(&blob, self.policy) {
                Ok(record) => records.push(record),
                Err(e) => {
                    dropped += 1;
                    warn!(address = %address, kind = %kind, error = %e, "Dropping undecodable record");
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_scan(kind.account_name(), total_seen, dropped);
        }
        debug!(kind = %kind, total_seen, dropped, "Scan complete");

        Ok(ScanResult {
            records,
            total_seen,
            dropped,
        })
    }

    /// Active listings only
    #[instrument(skip(self))]
    pub async fn scan_listings(&self) -> Result<ScanResult<SellData>, ReadError> {
        let mut result = self.scan::<SellData>(Vec::new()).await?;
        result.records.retain(|sell| sell.active);
        Ok(result)
    }

    /// Every decodable offer on `mint`
    #[instrument(skip(self), fields(mint = %mint))]
    pub async fn scan_offers(&self, mint: &Pubkey) -> Result<ScanResult<OfferData>, ReadError> {
        let mint_offset = RecordKind::OfferData
            .blob_offset("mint")
            .unwrap_or(super::layout::DISCRIMINATOR_LEN);
        self.scan(vec![AccountFilter::memcmp_address(mint_offset, mint)])
            .await
    }

    /// Every decodable auction, regardless of status
    #[instrument(skip(self))]
    pub async fn scan_auctions(&self) -> Result<ScanResult<AuctionData>, ReadError> {
        self.scan(Vec::new()).await
    }
}
