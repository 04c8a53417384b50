//! Raw marketplace instructions and ordering validation
//!
//! One builder per program instruction. Each takes the fully resolved
//! accounts and the arguments, and lays them out exactly as the program
//! expects:
//! 1. 8-byte Anchor discriminator `sha256("global:<snake_name>")[..8]`
//! 2. bump arguments, in program order
//! 3. remaining arguments, little-endian
//!
//! Account metas follow the program's declaration order with the signer and
//! writable roles it declares. No I/O happens here.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::market::errors::MarketError;
use crate::pda::METADATA_PROGRAM_ID;

/// Every instruction of the marketplace program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarketOperation {
    Initialize,
    UpdateFee,
    AddTeamTreasury,
    RemoveTeamTreasury,
    InitUserPool,
    DepositToEscrow,
    WithdrawFromEscrow,
    InitSellData,
    ListNftForSale,
    DelistNft,
    Purchase,
    InitOfferData,
    MakeOffer,
    CancelOffer,
    AcceptOffer,
    InitAuctionData,
    CreateAuction,
    PlaceBid,
    ClaimAuction,
    CancelAuction,
}

impl MarketOperation {
    pub const ALL: [MarketOperation; 20] = [
        MarketOperation::Initialize,
        MarketOperation::UpdateFee,
        MarketOperation::AddTeamTreasury,
        MarketOperation::RemoveTeamTreasury,
        MarketOperation::InitUserPool,
        MarketOperation::DepositToEscrow,
        MarketOperation::WithdrawFromEscrow,
        MarketOperation::InitSellData,
        MarketOperation::ListNftForSale,
        MarketOperation::DelistNft,
        MarketOperation::Purchase,
        MarketOperation::InitOfferData,
        MarketOperation::MakeOffer,
        MarketOperation::CancelOffer,
        MarketOperation::AcceptOffer,
        MarketOperation::InitAuctionData,
        MarketOperation::CreateAuction,
        MarketOperation::PlaceBid,
        MarketOperation::ClaimAuction,
        MarketOperation::CancelAuction,
    ];

    /// Program-side instruction name
    pub fn snake_name(self) -> &'static str {
        match self {
            MarketOperation::Initialize => "initialize",
            MarketOperation::UpdateFee => "update_fee",
            MarketOperation::AddTeamTreasury => "add_team_treasury",
            MarketOperation::RemoveTeamTreasury => "remove_team_treasury",
            MarketOperation::InitUserPool => "init_user_pool",
            MarketOperation::DepositToEscrow => "deposit_to_escrow",
            MarketOperation::WithdrawFromEscrow => "withdraw_from_escrow",
            MarketOperation::InitSellData => "init_sell_data",
            MarketOperation::ListNftForSale => "list_nft_for_sale",
            MarketOperation::DelistNft => "delist_nft",
            MarketOperation::Purchase => "purchase",
            MarketOperation::InitOfferData => "init_offer_data",
            MarketOperation::MakeOffer => "make_offer",
            MarketOperation::CancelOffer => "cancel_offer",
            MarketOperation::AcceptOffer => "accept_offer",
            MarketOperation::InitAuctionData => "init_auction_data",
            MarketOperation::CreateAuction => "create_auction",
            MarketOperation::PlaceBid => "place_bid",
            MarketOperation::ClaimAuction => "claim_auction",
            MarketOperation::CancelAuction => "cancel_auction",
        }
    }

    /// Client-facing name, as used in logs and metrics labels
    pub fn name(self) -> &'static str {
        match self {
            MarketOperation::Initialize => "initialize",
            MarketOperation::UpdateFee => "updateFee",
            MarketOperation::AddTeamTreasury => "addTeamTreasury",
            MarketOperation::RemoveTeamTreasury => "removeTeamTreasury",
            MarketOperation::InitUserPool => "initUserPool",
            MarketOperation::DepositToEscrow => "depositToEscrow",
            MarketOperation::WithdrawFromEscrow => "withdrawFromEscrow",
            MarketOperation::InitSellData => "initSellData",
            MarketOperation::ListNftForSale => "listNftForSale",
            MarketOperation::DelistNft => "delistNft",
            MarketOperation::Purchase => "purchase",
            MarketOperation::InitOfferData => "initOfferData",
            MarketOperation::MakeOffer => "makeOffer",
            MarketOperation::CancelOffer => "cancelOffer",
            MarketOperation::AcceptOffer => "acceptOffer",
            MarketOperation::InitAuctionData => "initAuctionData",
            MarketOperation::CreateAuction => "createAuction",
            MarketOperation::PlaceBid => "placeBid",
            MarketOperation::ClaimAuction => "claimAuction",
            MarketOperation::CancelAuction => "cancelAuction",
        }
    }

    pub fn discriminator(self) -> [u8; 8] {
        instruction_discriminator(self.snake_name())
    }
}

impl std::fmt::Display for MarketOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Anchor instruction discriminator for a snake_case instruction name
pub fn instruction_discriminator(snake_name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{snake_name}").as_bytes());
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&digest[..8]);
    tag
}

/// Instruction data writer
struct IxData(Vec<u8>);

impl IxData {
    fn new(op: MarketOperation) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&op.discriminator());
        Self(buf)
    }

    fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    fn u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn i64(mut self, value: i64) -> Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn pubkey(mut self, value: &Pubkey) -> Self {
        self.0.extend_from_slice(value.as_ref());
        self
    }

    fn finish(self) -> Vec<u8> {
        self.0
    }
}

fn signer(key: Pubkey) -> AccountMeta {
    AccountMeta::new(key, true)
}

fn writable(key: Pubkey) -> AccountMeta {
    AccountMeta::new(key, false)
}

fn readonly(key: Pubkey) -> AccountMeta {
    AccountMeta::new_readonly(key, false)
}

fn trailing(accounts: &mut Vec<AccountMeta>, remaining: &[Pubkey]) {
    accounts.extend(remaining.iter().copied().map(writable));
}

pub fn initialize(
    program_id: &Pubkey,
    admin: Pubkey,
    global: Pubkey,
    escrow: Pubkey,
    global_bump: u8,
    escrow_bump: u8,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            signer(admin),
            writable(global),
            writable(escrow),
            readonly(system_program::id()),
            readonly(sysvar::rent::id()),
        ],
        data: IxData::new(MarketOperation::Initialize)
            .u8(global_bump)
            .u8(escrow_bump)
            .finish(),
    }
}

pub fn update_fee(
    program_id: &Pubkey,
    admin: Pubkey,
    global: Pubkey,
    global_bump: u8,
    sol_fee: u64,
    token_fee: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![signer(admin), writable(global)],
        data: IxData::new(MarketOperation::UpdateFee)
            .u8(global_bump)
            .u64(sol_fee)
            .u64(token_fee)
            .finish(),
    }
}

pub fn add_team_treasury(
    program_id: &Pubkey,
    admin: Pubkey,
    global: Pubkey,
    global_bump: u8,
    treasury: &Pubkey,
    rate: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![signer(admin), writable(global)],
        data: IxData::new(MarketOperation::AddTeamTreasury)
            .u8(global_bump)
            .pubkey(treasury)
            .u64(rate)
            .finish(),
    }
}

pub fn remove_team_treasury(
    program_id: &Pubkey,
    admin: Pubkey,
    global: Pubkey,
    global_bump: u8,
    treasury: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![signer(admin), writable(global)],
        data: IxData::new(MarketOperation::RemoveTeamTreasury)
            .u8(global_bump)
            .pubkey(treasury)
            .finish(),
    }
}

pub fn init_user_pool(program_id: &Pubkey, owner: Pubkey, user: Pubkey, user_bump: u8) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            signer(owner),
            writable(user),
            readonly(system_program::id()),
            readonly(sysvar::rent::id()),
        ],
        data: IxData::new(MarketOperation::InitUserPool)
            .u8(user_bump)
            .finish(),
    }
}

/// Accounts shared by deposit and withdraw
#[derive(Debug, Clone, Copy)]
pub struct EscrowAccounts {
    pub owner: Pubkey,
    pub user: Pubkey,
    pub escrow: Pubkey,
    pub owner_token: Pubkey,
    pub escrow_token: Pubkey,
}

impl EscrowAccounts {
    fn metas(&self) -> Vec<AccountMeta> {
        vec![
            signer(self.owner),
            writable(self.user),
            writable(self.escrow),
            writable(self.owner_token),
            writable(self.escrow_token),
            readonly(spl_token::id()),
            readonly(system_program::id()),
        ]
    }
}

pub fn deposit_to_escrow(
    program_id: &Pubkey,
    accounts: &EscrowAccounts,
    user_bump: u8,
    escrow_bump: u8,
    sol: u64,
    token: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: IxData::new(MarketOperation::DepositToEscrow)
            .u8(user_bump)
            .u8(escrow_bump)
            .u64(sol)
            .u64(token)
            .finish(),
    }
}

pub fn withdraw_from_escrow(
    program_id: &Pubkey,
    accounts: &EscrowAccounts,
    user_bump: u8,
    escrow_bump: u8,
    sol: u64,
    token: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: IxData::new(MarketOperation::WithdrawFromEscrow)
            .u8(user_bump)
            .u8(escrow_bump)
            .u64(sol)
            .u64(token)
            .finish(),
    }
}

fn init_record(
    op: MarketOperation,
    program_id: &Pubkey,
    payer: Pubkey,
    record: Pubkey,
    mint: &Pubkey,
    bump: u8,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            signer(payer),
            writable(record),
            readonly(system_program::id()),
            readonly(sysvar::rent::id()),
        ],
        data: IxData::new(op).pubkey(mint).u8(bump).finish(),
    }
}

pub fn init_sell_data(program_id: &Pubkey, payer: Pubkey, sell: Pubkey, mint: &Pubkey, sell_bump: u8) -> Instruction {
    init_record(MarketOperation::InitSellData, program_id, payer, sell, mint, sell_bump)
}

pub fn init_offer_data(program_id: &Pubkey, payer: Pubkey, offer: Pubkey, mint: &Pubkey, offer_bump: u8) -> Instruction {
    init_record(MarketOperation::InitOfferData, program_id, payer, offer, mint, offer_bump)
}

pub fn init_auction_data(
    program_id: &Pubkey,
    payer: Pubkey,
    auction: Pubkey,
    mint: &Pubkey,
    auction_bump: u8,
) -> Instruction {
    init_record(MarketOperation::InitAuctionData, program_id, payer, auction, mint, auction_bump)
}

#[derive(Debug, Clone, Copy)]
pub struct ListAccounts {
    pub owner: Pubkey,
    pub global: Pubkey,
    pub sell: Pubkey,
    pub owner_nft: Pubkey,
    pub authority_nft: Pubkey,
    pub mint: Pubkey,
    pub metadata: Pubkey,
}

pub fn list_nft_for_sale(
    program_id: &Pubkey,
    accounts: &ListAccounts,
    global_bump: u8,
    sell_bump: u8,
    price_sol: u64,
    price_token: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            signer(accounts.owner),
            writable(accounts.global),
            writable(accounts.sell),
            writable(accounts.owner_nft),
            writable(accounts.authority_nft),
            readonly(accounts.mint),
            writable(accounts.metadata),
            readonly(spl_token::id()),
            readonly(METADATA_PROGRAM_ID),
        ],
        data: IxData::new(MarketOperation::ListNftForSale)
            .u8(global_bump)
            .u8(sell_bump)
            .u64(price_sol)
            .u64(price_token)
            .finish(),
    }
}

/// Accounts for returning an NFT from custody (delist, cancel auction)
#[derive(Debug, Clone, Copy)]
pub struct CustodyAccounts {
    pub owner: Pubkey,
    pub global: Pubkey,
    /// Sell or auction record
    pub record: Pubkey,
    pub owner_nft: Pubkey,
    pub authority_nft: Pubkey,
    pub mint: Pubkey,
}

impl CustodyAccounts {
    fn metas(&self) -> Vec<AccountMeta> {
        vec![
            signer(self.owner),
            writable(self.global),
            writable(self.record),
            writable(self.owner_nft),
            writable(self.authority_nft),
            readonly(self.mint),
            readonly(spl_token::id()),
        ]
    }
}

pub fn delist_nft(program_id: &Pubkey, accounts: &CustodyAccounts, global_bump: u8, sell_bump: u8) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: IxData::new(MarketOperation::DelistNft)
            .u8(global_bump)
            .u8(sell_bump)
            .finish(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn create_auction(
    program_id: &Pubkey,
    accounts: &CustodyAccounts,
    global_bump: u8,
    auction_bump: u8,
    start_price: u64,
    min_increase: u64,
    by_token: bool,
    end_date: i64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: IxData::new(MarketOperation::CreateAuction)
            .u8(global_bump)
            .u8(auction_bump)
            .u64(start_price)
            .u64(min_increase)
            .u64(u64::from(by_token))
            .i64(end_date)
            .finish(),
    }
}

pub fn cancel_auction(
    program_id: &Pubkey,
    accounts: &CustodyAccounts,
    global_bump: u8,
    auction_bump: u8,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: accounts.metas(),
        data: IxData::new(MarketOperation::CancelAuction)
            .u8(global_bump)
            .u8(auction_bump)
            .finish(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PurchaseAccounts {
    pub buyer: Pubkey,
    pub global: Pubkey,
    pub sell: Pubkey,
    pub buyer_user: Pubkey,
    pub buyer_nft: Pubkey,
    pub authority_nft: Pubkey,
    pub seller: Pubkey,
    pub seller_user: Pubkey,
    pub mint: Pubkey,
    pub buyer_currency: Pubkey,
    pub seller_currency: Pubkey,
}

#[derive(Debug, Clone, Copy)]
pub struct PurchaseBumps {
    pub global: u8,
    pub sell: u8,
    pub buyer: u8,
    pub seller: u8,
}

pub fn purchase(
    program_id: &Pubkey,
    accounts: &PurchaseAccounts,
    bumps: PurchaseBumps,
    by_token: bool,
    treasuries: &[Pubkey],
) -> Instruction {
    let mut metas = vec![
        signer(accounts.buyer),
        writable(accounts.global),
        writable(accounts.sell),
        writable(accounts.buyer_user),
        writable(accounts.buyer_nft),
        writable(accounts.authority_nft),
        writable(accounts.seller),
        writable(accounts.seller_user),
        readonly(accounts.mint),
        writable(accounts.buyer_currency),
        writable(accounts.seller_currency),
        readonly(spl_token::id()),
        readonly(system_program::id()),
    ];
    trailing(&mut metas, treasuries);
    Instruction {
        program_id: *program_id,
        accounts: metas,
        data: IxData::new(MarketOperation::Purchase)
            .u8(bumps.global)
            .u8(bumps.sell)
            .u8(bumps.buyer)
            .u8(bumps.seller)
            .u8(u8::from(by_token))
            .finish(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MakeOfferAccounts {
    pub owner: Pubkey,
    pub sell: Pubkey,
    pub offer: Pubkey,
    pub mint: Pubkey,
    pub user: Pubkey,
    pub escrow: Pubkey,
    pub owner_currency: Pubkey,
    pub escrow_token: Pubkey,
}

#[derive(Debug, Clone, Copy)]
pub struct MakeOfferBumps {
    pub sell: u8,
    pub offer: u8,
    pub user: u8,
    pub escrow: u8,
}

pub fn make_offer(
    program_id: &Pubkey,
    accounts: &MakeOfferAccounts,
    bumps: MakeOfferBumps,
    price: u64,
    by_token: bool,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            signer(accounts.owner),
            writable(accounts.sell),
            writable(accounts.offer),
            readonly(accounts.mint),
            writable(accounts.user),
            writable(accounts.escrow),
            writable(accounts.owner_currency),
            writable(accounts.escrow_token),
            readonly(spl_token::id()),
            readonly(system_program::id()),
        ],
        data: IxData::new(MarketOperation::MakeOffer)
            .u8(bumps.sell)
            .u8(bumps.offer)
            .u8(bumps.user)
            .u8(bumps.escrow)
            .u64(price)
            .u64(u64::from(by_token))
            .finish(),
    }
}

pub fn cancel_offer(program_id: &Pubkey, owner: Pubkey, offer: Pubkey, mint: Pubkey, offer_bump: u8) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![signer(owner), writable(offer), readonly(mint)],
        data: IxData::new(MarketOperation::CancelOffer)
            .u8(offer_bump)
            .finish(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptOfferAccounts {
    pub seller: Pubkey,
    pub sell: Pubkey,
    pub buyer: Pubkey,
    pub offer: Pubkey,
    pub seller_user: Pubkey,
    pub mint: Pubkey,
    pub global: Pubkey,
    pub buyer_user: Pubkey,
    pub buyer_nft: Pubkey,
    pub authority_nft: Pubkey,
    pub escrow: Pubkey,
    pub seller_currency: Pubkey,
    pub escrow_token: Pubkey,
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptOfferBumps {
    pub global: u8,
    pub sell: u8,
    pub offer: u8,
    pub buyer: u8,
    pub seller: u8,
    pub escrow: u8,
}

pub fn accept_offer(
    program_id: &Pubkey,
    accounts: &AcceptOfferAccounts,
    bumps: AcceptOfferBumps,
    treasuries: &[Pubkey],
) -> Instruction {
    let mut metas = vec![
        signer(accounts.seller),
        writable(accounts.sell),
        writable(accounts.buyer),
        writable(accounts.offer),
        writable(accounts.seller_user),
        readonly(accounts.mint),
        writable(accounts.global),
        writable(accounts.buyer_user),
        writable(accounts.buyer_nft),
        writable(accounts.authority_nft),
        writable(accounts.escrow),
        writable(accounts.seller_currency),
        writable(accounts.escrow_token),
        readonly(spl_token::id()),
        readonly(system_program::id()),
    ];
    trailing(&mut metas, treasuries);
    Instruction {
        program_id: *program_id,
        accounts: metas,
        data: IxData::new(MarketOperation::AcceptOffer)
            .u8(bumps.global)
            .u8(bumps.sell)
            .u8(bumps.offer)
            .u8(bumps.buyer)
            .u8(bumps.seller)
            .u8(bumps.escrow)
            .finish(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaceBidAccounts {
    pub bidder: Pubkey,
    pub auction: Pubkey,
    pub mint: Pubkey,
    pub escrow: Pubkey,
    pub bidder_currency: Pubkey,
    pub escrow_token: Pubkey,
    pub out_bidder: Pubkey,
    pub out_bidder_currency: Pubkey,
}

pub fn place_bid(
    program_id: &Pubkey,
    accounts: &PlaceBidAccounts,
    auction_bump: u8,
    escrow_bump: u8,
    price: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            signer(accounts.bidder),
            writable(accounts.auction),
            readonly(accounts.mint),
            writable(accounts.escrow),
            writable(accounts.bidder_currency),
            writable(accounts.escrow_token),
            writable(accounts.out_bidder),
            writable(accounts.out_bidder_currency),
            readonly(spl_token::id()),
            readonly(system_program::id()),
        ],
        data: IxData::new(MarketOperation::PlaceBid)
            .u8(auction_bump)
            .u8(escrow_bump)
            .u64(price)
            .finish(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClaimAuctionAccounts {
    pub bidder: Pubkey,
    pub global: Pubkey,
    pub auction: Pubkey,
    pub bidder_nft: Pubkey,
    pub authority_nft: Pubkey,
    pub mint: Pubkey,
    pub escrow: Pubkey,
    pub escrow_token: Pubkey,
    pub bidder_user: Pubkey,
    pub creator: Pubkey,
    pub creator_currency: Pubkey,
    pub creator_user: Pubkey,
}

pub fn claim_auction(
    program_id: &Pubkey,
    accounts: &ClaimAuctionAccounts,
    global_bump: u8,
    auction_bump: u8,
    escrow_bump: u8,
    treasuries: &[Pubkey],
) -> Instruction {
    let mut metas = vec![
        signer(accounts.bidder),
        writable(accounts.global),
        writable(accounts.auction),
        writable(accounts.bidder_nft),
        writable(accounts.authority_nft),
        readonly(accounts.mint),
        writable(accounts.escrow),
        writable(accounts.escrow_token),
        writable(accounts.bidder_user),
        writable(accounts.creator),
        writable(accounts.creator_currency),
        writable(accounts.creator_user),
        readonly(spl_token::id()),
        readonly(system_program::id()),
    ];
    trailing(&mut metas, treasuries);
    Instruction {
        program_id: *program_id,
        accounts: metas,
        data: IxData::new(MarketOperation::ClaimAuction)
            .u8(global_bump)
            .u8(auction_bump)
            .u8(escrow_bump)
            .finish(),
    }
}

/// Validate bundle ordering (debug/test only)
///
/// Expected order:
/// 1. zero or more token account creations
/// 2. exactly one marketplace program instruction, last
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(
    instructions: &[Instruction],
    program_id: &Pubkey,
) -> Result<(), MarketError> {
    let Some((last, bootstrap)) = instructions.split_last() else {
        return Err(MarketError::invalid_order("Instruction list is empty"));
    };

    if last.program_id != *program_id {
        return Err(MarketError::invalid_order(format!(
            "Last instruction must target the marketplace program, got program_id: {}",
            last.program_id
        )));
    }

    for (idx, ix) in bootstrap.iter().enumerate() {
        if ix.program_id == *program_id {
            return Err(MarketError::invalid_order(format!(
                "Multiple marketplace instructions found (at position {idx}). Only one allowed, last"
            )));
        }
        if ix.program_id != spl_associated_token_account::id() {
            return Err(MarketError::invalid_order(format!(
                "Bootstrap instruction at position {idx} is not a token account creation: {}",
                ix.program_id
            )));
        }
    }

    Ok(())
}

/// Release builds skip the ordering check
#[cfg(not(debug_assertions))]
#[inline(always)]
pub fn sanity_check_ix_order(
    _instructions: &[Instruction],
    _program_id: &Pubkey,
) -> Result<(), MarketError> {
    Ok(())
}
