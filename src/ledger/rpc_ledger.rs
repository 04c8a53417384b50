use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
    rpc_request::TokenAccountsFilter,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use tracing::{debug, instrument};

use super::{AccountFilter, LedgerClient, LedgerError, TokenHolding};
use crate::config::MarketConfig;
use crate::metrics::{MarketMetrics, Timer};

/// [`LedgerClient`] backed by a JSON-RPC endpoint
pub struct RpcLedger {
    client: RpcClient,
    endpoint: String,
    commitment: CommitmentConfig,
    timeout: Duration,
    metrics: Option<Arc<MarketMetrics>>,
}

impl RpcLedger {
    pub fn new(endpoint: impl Into<String>, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        let client =
            RpcClient::new_with_timeout_and_commitment(endpoint.clone(), timeout, commitment);
        Self {
            client,
            endpoint,
            commitment,
            timeout,
            metrics: None,
        }
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self, LedgerError> {
        let commitment = config
            .commitment()
            .map_err(|e| LedgerError::Configuration(e.to_string()))?;
        Ok(Self::new(config.rpc.rpc_url.clone(), commitment, config.timeout()))
    }

    pub fn with_metrics(mut self, metrics: Arc<MarketMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> LedgerError {
        LedgerError::from_client_error(err, &self.endpoint, self.timeout.as_millis() as u64)
    }

    fn observe(&self, method: &str, timer: &Timer) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_ledger(method, timer);
        }
        debug!(method, elapsed_ms = timer.elapsed_ms(), "Ledger query completed");
    }

    fn to_rpc_filter(filter: &AccountFilter) -> RpcFilterType {
        match filter {
            AccountFilter::DataSize(size) => RpcFilterType::DataSize(*size),
            AccountFilter::Memcmp { offset, bytes } => {
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(*offset, bytes.clone()))
            }
        }
    }

    fn parse_pubkey(what: &str, value: &str) -> Result<Pubkey, LedgerError> {
        Pubkey::from_str(value).map_err(|e| LedgerError::invalid_data(what, e.to_string()))
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoint", &self.endpoint)
            .field("commitment", &self.commitment)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let timer = Timer::new();
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| self.map_err(e))?;
        self.observe("get_account_data", &timer);
        Ok(response.value.map(|account| account.data))
    }

    #[instrument(skip(self, filters), fields(endpoint = %self.endpoint, filters = filters.len()))]
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[AccountFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>, LedgerError> {
        let timer = Timer::new();
        let config = RpcProgramAccountsConfig {
            filters: Some(filters.iter().map(Self::to_rpc_filter).collect()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..Default::default()
            },
            ..Default::default()
        };
        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await
            .map_err(|e| self.map_err(e))?;
        self.observe("get_program_accounts", &timer);

        Ok(accounts
            .into_iter()
            .map(|(address, account)| (address, account.data))
            .collect())
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn get_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<Pubkey>, LedgerError> {
        let timer = Timer::new();
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
            .await
            .map_err(|e| self.map_err(e))?;
        self.observe("get_token_accounts_by_owner", &timer);

        accounts
            .iter()
            .map(|keyed| Self::parse_pubkey("token account", &keyed.pubkey))
            .collect()
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn get_token_largest_accounts(
        &self,
        mint: &Pubkey,
    ) -> Result<Vec<TokenHolding>, LedgerError> {
        let timer = Timer::new();
        let balances = self
            .client
            .get_token_largest_accounts(mint)
            .await
            .map_err(|e| self.map_err(e))?;
        self.observe("get_token_largest_accounts", &timer);

        balances
            .iter()
            .map(|balance| {
                let address = Self::parse_pubkey("holder account", &balance.address)?;
                let amount = balance.amount.amount.parse::<u64>().map_err(|e| {
                    LedgerError::invalid_data("holder amount", e.to_string())
                })?;
                Ok(TokenHolding { address, amount })
            })
            .collect()
    }
}
