//! Offers: make, cancel, accept

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument};

use crate::ledger::LedgerClient;
use crate::market::client::{AssemblyContext, Bootstrap, MarketClient};
use crate::market::errors::{non_negative, MarketError};
use crate::market::instructions::{
    self, AcceptOfferAccounts, AcceptOfferBumps, MakeOfferAccounts, MakeOfferBumps, MarketOperation,
};
use crate::market::output::InstructionBundle;
use crate::resolver::{associated_account, treasury_targets};

impl<L: LedgerClient> MarketClient<L> {
    #[instrument(skip(self), fields(buyer = %buyer, mint = %mint))]
    pub async fn init_offer_data(&self, buyer: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::InitOfferData, buyer);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let offer = self.addresses().offer_data(mint, buyer)?;
            let ix = instructions::init_offer_data(&self.program_id(), *buyer, offer.address, mint, offer.bump);
            Ok(InstructionBundle::new(MarketOperation::InitOfferData, *buyer, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Escrow `price` against a listed mint
    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    pub async fn make_offer(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        price: i64,
        by_token: bool,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::MakeOffer, owner);
        let result = self.build_make_offer(owner, mint, price, by_token).await;
        self.complete(ctx, result)
    }

    async fn build_make_offer(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        price: i64,
        by_token: bool,
    ) -> Result<InstructionBundle, MarketError> {
        let price = non_negative("price", price)?;

        let sell = self.addresses().sell_data(mint)?;
        let offer = self.addresses().offer_data(mint, owner)?;
        let user = self.addresses().user_data(owner)?;
        let escrow = self.escrow()?;
        let token_mint = self.token_mint();

        let (owner_currency, escrow_token) = tokio::try_join!(
            self.resolver.resolve_currency(owner, owner, by_token),
            self.resolver.resolve_ata(owner, &escrow.address, &token_mint),
        )?;

        let mut bootstrap = Bootstrap::new();
        let accounts = MakeOfferAccounts {
            owner: *owner,
            sell: sell.address,
            offer: offer.address,
            mint: *mint,
            user: user.address,
            escrow: escrow.address,
            owner_currency: bootstrap.take(owner_currency),
            escrow_token: bootstrap.take(escrow_token),
        };
        let bumps = MakeOfferBumps {
            sell: sell.bump,
            offer: offer.bump,
            user: user.bump,
            escrow: escrow.bump,
        };
        let ix = instructions::make_offer(&self.program_id(), &accounts, bumps, price, by_token);
        Ok(InstructionBundle::new(
            MarketOperation::MakeOffer,
            *owner,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    pub async fn cancel_offer(&self, owner: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::CancelOffer, owner);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let offer = self.addresses().offer_data(mint, owner)?;
            let ix = instructions::cancel_offer(&self.program_id(), *owner, offer.address, *mint, offer.bump);
            Ok(InstructionBundle::new(MarketOperation::CancelOffer, *owner, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Accept `buyer`'s offer on `mint`
    ///
    /// The seller is recovered from the listing and pays for the bundle.
    /// Treasury accounts follow the offer's currency.
    #[instrument(skip(self, treasuries), fields(mint = %mint, buyer = %buyer))]
    pub async fn accept_offer(
        &self,
        mint: &Pubkey,
        buyer: &Pubkey,
        treasuries: &[Pubkey],
    ) -> Result<InstructionBundle, MarketError> {
        let mut ctx = self.open(MarketOperation::AcceptOffer);
        let result = self.build_accept_offer(&mut ctx, mint, buyer, treasuries).await;
        self.complete(ctx, result)
    }

    async fn build_accept_offer(
        &self,
        ctx: &mut AssemblyContext,
        mint: &Pubkey,
        buyer: &Pubkey,
        treasuries: &[Pubkey],
    ) -> Result<InstructionBundle, MarketError> {
        let global = self.global()?;
        let escrow = self.escrow()?;
        let sell_pda = self.addresses().sell_data(mint)?;
        let offer_pda = self.addresses().offer_data(mint, buyer)?;
        let buyer_user = self.addresses().user_data(buyer)?;

        let (sell, offer) = tokio::try_join!(self.get_sell_data(mint), self.get_offer_data(mint, buyer))?;
        let sell = sell.ok_or(MarketError::ListingNotFound { mint: *mint })?;
        let offer = offer.ok_or(MarketError::OfferNotFound {
            mint: *mint,
            buyer: *buyer,
        })?;
        let seller = sell.seller;
        ctx.log_start(&seller);
        debug!(seller = %seller, price = offer.offer_price, by_token = offer.by_token, "Offer loaded");

        let seller_user = self.addresses().user_data(&seller)?;
        let token_mint = self.token_mint();

        // The seller is receiving, so a missing currency account is created
        let (buyer_nft, seller_currency) = tokio::try_join!(
            self.resolver.resolve_ata(&seller, buyer, mint),
            self.resolver.resolve_currency(&seller, &seller, false),
        )?;

        let mut bootstrap = Bootstrap::new();
        let buyer_nft = bootstrap.take(buyer_nft);
        let seller_currency = bootstrap.take(seller_currency);

        let accounts = AcceptOfferAccounts {
            seller,
            sell: sell_pda.address,
            buyer: *buyer,
            offer: offer_pda.address,
            seller_user: seller_user.address,
            mint: *mint,
            global: global.address,
            buyer_user: buyer_user.address,
            buyer_nft,
            authority_nft: associated_account(&global.address, mint),
            escrow: escrow.address,
            seller_currency,
            escrow_token: associated_account(&escrow.address, &token_mint),
        };
        let bumps = AcceptOfferBumps {
            global: global.bump,
            sell: sell_pda.bump,
            offer: offer_pda.bump,
            buyer: buyer_user.bump,
            seller: seller_user.bump,
            escrow: escrow.bump,
        };

        let remaining = treasury_targets(treasuries, offer.by_token, &token_mint);
        let ix = instructions::accept_offer(&self.program_id(), &accounts, bumps, &remaining);
        Ok(InstructionBundle::new(
            MarketOperation::AcceptOffer,
            seller,
            bootstrap.into_instructions(),
            ix,
            remaining,
        ))
    }
}
