//! English auctions: create, bid, claim, cancel

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, instrument};

use crate::ledger::LedgerClient;
use crate::market::client::{Bootstrap, MarketClient};
use crate::market::errors::{non_negative, MarketError};
use crate::market::instructions::{
    self, ClaimAuctionAccounts, CustodyAccounts, MarketOperation, PlaceBidAccounts,
};
use crate::market::output::InstructionBundle;
use crate::resolver::{associated_account, treasury_targets};

impl<L: LedgerClient> MarketClient<L> {
    #[instrument(skip(self), fields(payer = %payer, mint = %mint))]
    pub async fn init_auction_data(&self, payer: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::InitAuctionData, payer);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let auction = self.addresses().auction_data(mint)?;
            let ix = instructions::init_auction_data(&self.program_id(), *payer, auction.address, mint, auction.bump);
            Ok(InstructionBundle::new(MarketOperation::InitAuctionData, *payer, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Move the NFT into custody and open an auction
    ///
    /// `end_date` is passed through unchecked; the program judges expiry.
    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    pub async fn create_auction(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        start_price: i64,
        min_increase: i64,
        by_token: bool,
        end_date: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::CreateAuction, owner);
        let result = self
            .build_create_auction(owner, mint, start_price, min_increase, by_token, end_date)
            .await;
        self.complete(ctx, result)
    }

    async fn build_create_auction(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        start_price: i64,
        min_increase: i64,
        by_token: bool,
        end_date: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let start_price = non_negative("start_price", start_price)?;
        let min_increase = non_negative("min_increase", min_increase)?;

        let global = self.global()?;
        let auction = self.addresses().auction_data(mint)?;

        let (owner_nft, authority_nft) = tokio::try_join!(
            self.resolver.resolve_nft_source(owner, mint, &global.address),
            self.resolver.resolve_ata(owner, &global.address, mint),
        )?;

        let mut bootstrap = Bootstrap::new();
        let accounts = CustodyAccounts {
            owner: *owner,
            global: global.address,
            record: auction.address,
            owner_nft,
            authority_nft: bootstrap.take(authority_nft),
            mint: *mint,
        };
        let ix = instructions::create_auction(
            &self.program_id(),
            &accounts,
            global.bump,
            auction.bump,
            start_price,
            min_increase,
            by_token,
            end_date,
        );
        Ok(InstructionBundle::new(
            MarketOperation::CreateAuction,
            *owner,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    /// Bid `price` on a live auction
    ///
    /// The previous highest bidder is refunded in the same instruction. With
    /// no prior bid the refund slots point back at the bidder.
    #[instrument(skip(self), fields(bidder = %bidder, mint = %mint))]
    pub async fn place_bid(&self, bidder: &Pubkey, mint: &Pubkey, price: i64) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::PlaceBid, bidder);
        let result = self.build_place_bid(bidder, mint, price).await;
        self.complete(ctx, result)
    }

    async fn build_place_bid(
        &self,
        bidder: &Pubkey,
        mint: &Pubkey,
        price: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let price = non_negative("price", price)?;

        let auction_pda = self.addresses().auction_data(mint)?;
        let escrow = self.escrow()?;
        let token_mint = self.token_mint();

        let (auction, escrow_token) = tokio::try_join!(
            self.get_auction_data(mint),
            self.resolver.resolve_ata(bidder, &escrow.address, &token_mint),
        )?;
        let auction = auction.ok_or(MarketError::AuctionNotFound { mint: *mint })?;
        debug!(phase = ?auction.phase(), highest_bid = auction.highest_bid, "Auction loaded");

        let (bidder_currency, out_bidder_currency) = if auction.has_bid() {
            let (own, previous) = tokio::try_join!(
                self.resolver.resolve_currency(bidder, bidder, auction.by_token),
                self.resolver.resolve_ata(bidder, &auction.last_bidder, &token_mint),
            )?;
            (own, Some(previous))
        } else {
            let own = self
                .resolver
                .resolve_currency(bidder, bidder, auction.by_token)
                .await?;
            (own, None)
        };

        // Creation order: bidder currency, escrow, previous bidder
        let mut bootstrap = Bootstrap::new();
        let bidder_currency = bootstrap.take(bidder_currency);
        let escrow_token = bootstrap.take(escrow_token);
        let (out_bidder, out_bidder_currency) = match out_bidder_currency {
            Some(resolved) => (auction.last_bidder, bootstrap.take(resolved)),
            None => (*bidder, bidder_currency),
        };

        let accounts = PlaceBidAccounts {
            bidder: *bidder,
            auction: auction_pda.address,
            mint: *mint,
            escrow: escrow.address,
            bidder_currency,
            escrow_token,
            out_bidder,
            out_bidder_currency,
        };
        let ix = instructions::place_bid(&self.program_id(), &accounts, auction_pda.bump, escrow.bump, price);
        Ok(InstructionBundle::new(
            MarketOperation::PlaceBid,
            *bidder,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    /// Settle a finished auction for the winning bidder
    #[instrument(skip(self, treasuries), fields(bidder = %bidder, mint = %mint))]
    pub async fn claim_auction(
        &self,
        bidder: &Pubkey,
        mint: &Pubkey,
        treasuries: &[Pubkey],
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::ClaimAuction, bidder);
        let result = self.build_claim_auction(bidder, mint, treasuries).await;
        self.complete(ctx, result)
    }

    async fn build_claim_auction(
        &self,
        bidder: &Pubkey,
        mint: &Pubkey,
        treasuries: &[Pubkey],
    ) -> Result<InstructionBundle, MarketError> {
        let global = self.global()?;
        let escrow = self.escrow()?;
        let auction_pda = self.addresses().auction_data(mint)?;
        let bidder_user = self.addresses().user_data(bidder)?;
        let token_mint = self.token_mint();

        let (auction, bidder_nft) = tokio::try_join!(
            self.get_auction_data(mint),
            self.resolver.resolve_ata(bidder, bidder, mint),
        )?;
        let auction = auction.ok_or(MarketError::AuctionNotFound { mint: *mint })?;
        let creator = auction.creator;

        let creator_user = self.addresses().user_data(&creator)?;
        let creator_currency = self.resolver.resolve_ata(bidder, &creator, &token_mint).await?;

        let mut bootstrap = Bootstrap::new();
        let bidder_nft = bootstrap.take(bidder_nft);
        let creator_currency = bootstrap.take(creator_currency);

        let accounts = ClaimAuctionAccounts {
            bidder: *bidder,
            global: global.address,
            auction: auction_pda.address,
            bidder_nft,
            authority_nft: associated_account(&global.address, mint),
            mint: *mint,
            escrow: escrow.address,
            escrow_token: associated_account(&escrow.address, &token_mint),
            bidder_user: bidder_user.address,
            creator,
            creator_currency,
            creator_user: creator_user.address,
        };

        let remaining = treasury_targets(treasuries, auction.by_token, &token_mint);
        let ix = instructions::claim_auction(
            &self.program_id(),
            &accounts,
            global.bump,
            auction_pda.bump,
            escrow.bump,
            &remaining,
        );
        Ok(InstructionBundle::new(
            MarketOperation::ClaimAuction,
            *bidder,
            bootstrap.into_instructions(),
            ix,
            remaining,
        ))
    }

    /// Return the NFT of an auction nobody bid on
    #[instrument(skip(self), fields(creator = %creator, mint = %mint))]
    pub async fn cancel_auction(&self, creator: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::CancelAuction, creator);
        let result = self.build_cancel_auction(creator, mint).await;
        self.complete(ctx, result)
    }

    async fn build_cancel_auction(&self, creator: &Pubkey, mint: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let global = self.global()?;
        let auction = self.addresses().auction_data(mint)?;

        let mut bootstrap = Bootstrap::new();
        let creator_nft = bootstrap.take(self.resolver.resolve_ata(creator, creator, mint).await?);

        let accounts = CustodyAccounts {
            owner: *creator,
            global: global.address,
            record: auction.address,
            owner_nft: creator_nft,
            authority_nft: associated_account(&global.address, mint),
            mint: *mint,
        };
        let ix = instructions::cancel_auction(&self.program_id(), &accounts, global.bump, auction.bump);
        Ok(InstructionBundle::new(
            MarketOperation::CancelAuction,
            *creator,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }
}
