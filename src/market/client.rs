use std::sync::Arc;

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use crate::config::MarketConfig;
use crate::ledger::LedgerClient;
use crate::market::errors::MarketError;
use crate::market::instructions::{sanity_check_ix_order, MarketOperation};
use crate::market::output::InstructionBundle;
use crate::metrics::{MarketMetrics, Timer};
use crate::pda::{Derived, MarketAddresses};
use crate::resolver::{AccountResolver, ResolvedAccount};
use crate::state::{
    AuctionData, DiscriminatorPolicy, GlobalPool, OfferData, ScanResult, SellData, StateReader,
    UserData,
};
use crate::structured_logging::MarketLogger;

/// Transaction assembler for one marketplace deployment
///
/// Cheap to clone; every clone shares the same ledger handle.
pub struct MarketClient<L: LedgerClient> {
    addresses: MarketAddresses,
    token_mint: Pubkey,
    pub(crate) reader: StateReader<L>,
    pub(crate) resolver: AccountResolver<L>,
    metrics: Option<Arc<MarketMetrics>>,
}

impl<L: LedgerClient> Clone for MarketClient<L> {
    fn clone(&self) -> Self {
        Self {
            addresses: self.addresses,
            token_mint: self.token_mint,
            reader: self.reader.clone(),
            resolver: self.resolver.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Per-assembly bookkeeping
pub(crate) struct AssemblyContext {
    operation: MarketOperation,
    logger: MarketLogger,
    timer: Timer,
    payer: Option<Pubkey>,
}

impl AssemblyContext {
    /// Log the start of the assembly once the paying party is known
    pub(crate) fn log_start(&mut self, payer: &Pubkey) {
        self.logger
            .log_assembly_start(self.operation.name(), &payer.to_string());
        self.payer = Some(*payer);
    }
}

/// Ordered collection of account creations
///
/// An address is created at most once even when two roles resolve to it.
#[derive(Debug, Default)]
pub(crate) struct Bootstrap {
    instructions: Vec<Instruction>,
    created: Vec<Pubkey>,
}

impl Bootstrap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record the creation (if any) and return the address
    pub(crate) fn take(&mut self, resolved: ResolvedAccount) -> Pubkey {
        if let Some(ix) = resolved.create_instruction {
            if !self.created.contains(&resolved.address) {
                self.created.push(resolved.address);
                self.instructions.push(ix);
            }
        }
        resolved.address
    }

    pub(crate) fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl<L: LedgerClient> MarketClient<L> {
    pub fn new(
        ledger: Arc<L>,
        program_id: Pubkey,
        token_mint: Pubkey,
        policy: DiscriminatorPolicy,
    ) -> Self {
        let addresses = MarketAddresses::new(program_id);
        Self {
            addresses,
            token_mint,
            reader: StateReader::new(Arc::clone(&ledger), addresses, policy),
            resolver: AccountResolver::new(ledger, token_mint),
            metrics: None,
        }
    }

    pub fn from_config(ledger: Arc<L>, config: &MarketConfig) -> Result<Self, MarketError> {
        config.validate()?;
        Ok(Self::new(
            ledger,
            config.program_id()?,
            config.token_mint()?,
            config.discriminator_policy(),
        ))
    }

    pub fn with_metrics(mut self, metrics: Arc<MarketMetrics>) -> Self {
        self.reader = self.reader.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    pub fn addresses(&self) -> &MarketAddresses {
        &self.addresses
    }

    pub fn program_id(&self) -> Pubkey {
        self.addresses.program_id()
    }

    pub fn token_mint(&self) -> Pubkey {
        self.token_mint
    }

    pub fn reader(&self) -> &StateReader<L> {
        &self.reader
    }

    pub(crate) fn global(&self) -> Result<Derived, MarketError> {
        Ok(self.addresses.global_authority()?)
    }

    pub(crate) fn escrow(&self) -> Result<Derived, MarketError> {
        Ok(self.addresses.escrow_vault()?)
    }

    pub(crate) fn begin(&self, operation: MarketOperation, payer: &Pubkey) -> AssemblyContext {
        let mut ctx = self.open(operation);
        ctx.log_start(payer);
        ctx
    }

    /// Start an assembly whose payer is read from the ledger
    pub(crate) fn open(&self, operation: MarketOperation) -> AssemblyContext {
        if let Some(metrics) = &self.metrics {
            metrics
                .assemblies_total
                .with_label_values(&[operation.name()])
                .inc();
        }
        AssemblyContext {
            operation,
            logger: MarketLogger::new_context(),
            timer: Timer::new(),
            payer: None,
        }
    }

    pub(crate) fn complete(
        &self,
        ctx: AssemblyContext,
        result: Result<InstructionBundle, MarketError>,
    ) -> Result<InstructionBundle, MarketError> {
        let name = ctx.operation.name();
        let checked = result.and_then(|bundle| {
            sanity_check_ix_order(&bundle.instructions, &self.program_id())?;
            Ok(bundle)
        });

        match &checked {
            Ok(bundle) => {
                debug_assert_eq!(ctx.payer, Some(bundle.payer), "start log named another payer");
                for ix in bundle.bootstrap() {
                    if let Some(account) = ix.accounts.get(1) {
                        ctx.logger.log_bootstrap(name, &account.pubkey.to_string());
                    }
                }
                ctx.logger.log_assembled(
                    name,
                    bundle.instructions.len(),
                    bundle.bootstrap_count(),
                    ctx.timer.elapsed_ms(),
                );
                if let Some(metrics) = &self.metrics {
                    metrics
                        .bootstrap_instructions
                        .inc_by(bundle.bootstrap_count() as u64);
                    ctx.timer.observe_duration(&metrics.build_latency);
                }
            }
            Err(e) => {
                ctx.logger.log_assembly_failure(
                    name,
                    e.category(),
                    &e.to_string(),
                    failed_endpoint(e),
                    ctx.timer.elapsed_ms(),
                );
                if let Some(metrics) = &self.metrics {
                    metrics
                        .assemblies_failed
                        .with_label_values(&[name, e.category()])
                        .inc();
                }
            }
        }
        checked
    }

    pub async fn get_global_pool(&self) -> Result<Option<GlobalPool>, MarketError> {
        Ok(self.reader.get_global_pool().await?)
    }

    pub async fn get_user_data(&self, owner: &Pubkey) -> Result<Option<UserData>, MarketError> {
        Ok(self.reader.get_user_data(owner).await?)
    }

    pub async fn get_sell_data(&self, mint: &Pubkey) -> Result<Option<SellData>, MarketError> {
        Ok(self.reader.get_sell_data(mint).await?)
    }

    pub async fn get_offer_data(
        &self,
        mint: &Pubkey,
        buyer: &Pubkey,
    ) -> Result<Option<OfferData>, MarketError> {
        Ok(self.reader.get_offer_data(mint, buyer).await?)
    }

    pub async fn get_auction_data(&self, mint: &Pubkey) -> Result<Option<AuctionData>, MarketError> {
        Ok(self.reader.get_auction_data(mint).await?)
    }

    pub async fn scan_listings(&self) -> Result<ScanResult<SellData>, MarketError> {
        let result = self.reader.scan_listings().await?;
        MarketLogger::new_context().log_scan("SellData", result.len(), result.total_seen, result.dropped);
        Ok(result)
    }

    pub async fn scan_offers(&self, mint: &Pubkey) -> Result<ScanResult<OfferData>, MarketError> {
        let result = self.reader.scan_offers(mint).await?;
        MarketLogger::new_context().log_scan("OfferData", result.len(), result.total_seen, result.dropped);
        Ok(result)
    }

    pub async fn scan_auctions(&self) -> Result<ScanResult<AuctionData>, MarketError> {
        let result = self.reader.scan_auctions().await?;
        MarketLogger::new_context().log_scan("AuctionData", result.len(), result.total_seen, result.dropped);
        Ok(result)
    }
}

/// Endpoint behind a ledger failure, for the failure log
fn failed_endpoint(err: &MarketError) -> Option<&str> {
    match err {
        MarketError::Ledger(ledger) => ledger.endpoint(),
        _ => None,
    }
}
