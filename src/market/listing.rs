//! Fixed-price listings: list, delist, purchase

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument};

use crate::ledger::LedgerClient;
use crate::market::client::{Bootstrap, MarketClient};
use crate::market::errors::{non_negative, MarketError};
use crate::market::instructions::{
    self, CustodyAccounts, ListAccounts, MarketOperation, PurchaseAccounts, PurchaseBumps,
};
use crate::market::output::InstructionBundle;
use crate::resolver::{associated_account, treasury_targets};

impl<L: LedgerClient> MarketClient<L> {
    #[instrument(skip(self), fields(payer = %payer, mint = %mint))]
    pub async fn init_sell_data(&self, payer: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::InitSellData, payer);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let sell = self.addresses().sell_data(mint)?;
            let ix = instructions::init_sell_data(&self.program_id(), *payer, sell.address, mint, sell.bump);
            Ok(InstructionBundle::new(MarketOperation::InitSellData, *payer, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Move the NFT into marketplace custody at the given prices
    ///
    /// Prices are checked before any ledger access. The owner's NFT may sit
    /// in a non-canonical account, which is then used as the source.
    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    pub async fn list_nft_for_sale(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        price_sol: i64,
        price_token: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::ListNftForSale, owner);
        let result = self.build_list(owner, mint, price_sol, price_token).await;
        self.complete(ctx, result)
    }

    async fn build_list(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        price_sol: i64,
        price_token: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let price_sol = non_negative("price_sol", price_sol)?;
        let price_token = non_negative("price_token", price_token)?;

        let global = self.global()?;
        let sell = self.addresses().sell_data(mint)?;
        let metadata = self.addresses().metadata(mint)?;

        let (owner_nft, authority_nft) = tokio::try_join!(
            self.resolver.resolve_nft_source(owner, mint, &global.address),
            self.resolver.resolve_ata(owner, &global.address, mint),
        )?;

        let mut bootstrap = Bootstrap::new();
        let accounts = ListAccounts {
            owner: *owner,
            global: global.address,
            sell: sell.address,
            owner_nft,
            authority_nft: bootstrap.take(authority_nft),
            mint: *mint,
            metadata: metadata.address,
        };
        let ix = instructions::list_nft_for_sale(
            &self.program_id(),
            &accounts,
            global.bump,
            sell.bump,
            price_sol,
            price_token,
        );
        Ok(InstructionBundle::new(
            MarketOperation::ListNftForSale,
            *owner,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    /// Return a listed NFT to its owner
    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    pub async fn delist_nft(&self, owner: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::DelistNft, owner);
        let result = self.build_delist(owner, mint).await;
        self.complete(ctx, result)
    }

    async fn build_delist(&self, owner: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let global = self.global()?;
        let sell = self.addresses().sell_data(mint)?;

        let mut bootstrap = Bootstrap::new();
        let owner_nft = bootstrap.take(self.resolver.resolve_ata(owner, owner, mint).await?);

        let accounts = CustodyAccounts {
            owner: *owner,
            global: global.address,
            record: sell.address,
            owner_nft,
            authority_nft: associated_account(&global.address, mint),
            mint: *mint,
        };
        let ix = instructions::delist_nft(&self.program_id(), &accounts, global.bump, sell.bump);
        Ok(InstructionBundle::new(
            MarketOperation::DelistNft,
            *owner,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    /// Buy a listed NFT at its listed price
    ///
    /// `treasuries` are the team treasury wallets in global-record order. For
    /// token purchases they are replaced by their token accounts; the slice
    /// itself is left untouched.
    #[instrument(skip(self, treasuries), fields(buyer = %buyer, mint = %mint))]
    pub async fn purchase(
        &self,
        buyer: &Pubkey,
        mint: &Pubkey,
        by_token: bool,
        treasuries: &[Pubkey],
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::Purchase, buyer);
        let result = self.build_purchase(buyer, mint, by_token, treasuries).await;
        self.complete(ctx, result)
    }

    async fn build_purchase(
        &self,
        buyer: &Pubkey,
        mint: &Pubkey,
        by_token: bool,
        treasuries: &[Pubkey],
    ) -> Result<InstructionBundle, MarketError> {
        let global = self.global()?;
        let sell_pda = self.addresses().sell_data(mint)?;
        let buyer_user = self.addresses().user_data(buyer)?;

        let (sell, buyer_currency, buyer_nft) = tokio::try_join!(
            self.get_sell_data(mint),
            self.resolver.resolve_currency(buyer, buyer, by_token),
            self.resolver.resolve_ata(buyer, buyer, mint),
        )?;
        let sell = sell.ok_or(MarketError::ListingNotFound { mint: *mint })?;
        debug!(seller = %sell.seller, active = sell.active, "Listing loaded");

        let seller_user = self.addresses().user_data(&sell.seller)?;
        let seller_currency = self
            .resolver
            .resolve_ata(buyer, &sell.seller, &self.token_mint())
            .await?;

        // Creation order: buyer currency, buyer NFT, seller currency
        let mut bootstrap = Bootstrap::new();
        let buyer_currency = bootstrap.take(buyer_currency);
        let buyer_nft = bootstrap.take(buyer_nft);
        let seller_currency = bootstrap.take(seller_currency);

        let accounts = PurchaseAccounts {
            buyer: *buyer,
            global: global.address,
            sell: sell_pda.address,
            buyer_user: buyer_user.address,
            buyer_nft,
            authority_nft: associated_account(&global.address, mint),
            seller: sell.seller,
            seller_user: seller_user.address,
            mint: *mint,
            buyer_currency,
            seller_currency,
        };
        let bumps = PurchaseBumps {
            global: global.bump,
            sell: sell_pda.bump,
            buyer: buyer_user.bump,
            seller: seller_user.bump,
        };

        let remaining = treasury_targets(treasuries, by_token, &self.token_mint());
        let ix = instructions::purchase(&self.program_id(), &accounts, bumps, by_token, &remaining);
        Ok(InstructionBundle::new(
            MarketOperation::Purchase,
            *buyer,
            bootstrap.into_instructions(),
            ix,
            remaining,
        ))
    }
}
