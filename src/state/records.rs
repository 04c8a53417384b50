//! Typed marketplace records and their decode/encode routines

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;

use super::layout::{
    DecodeError, DiscriminatorPolicy, FieldReader, FieldWriter, RecordKind, ADDRESS_LEN,
    DISCRIMINATOR_LEN, GLOBAL_POOL_FIELDS, GLOBAL_POOL_FIXED_PAYLOAD_LEN, MAX_TEAM_COUNT,
    U64_LEN,
};

fn ser_pubkey<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(key)
}

fn ser_pubkeys<S: Serializer>(keys: &[Pubkey], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(keys.iter().map(|k| k.to_string()))
}

fn timestamp(seconds: u64) -> Option<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// A record with a declared layout
pub trait AccountRecord: Sized {
    const KIND: RecordKind;

    /// Read payload fields in declared order
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError>;

    /// Write payload fields in declared order
    fn write_fields(&self, writer: &mut FieldWriter);

    /// Decode a full account blob (discriminator included)
    fn decode(blob: &[u8], policy: DiscriminatorPolicy) -> Result<Self, DecodeError> {
        decode_record(blob, policy)
    }

    /// Encode to a full account blob carrying the kind's discriminator
    fn encode(&self) -> Vec<u8> {
        let mut writer = FieldWriter::for_kind(Self::KIND);
        self.write_fields(&mut writer);
        writer.into_bytes()
    }
}

/// Decode `blob` as `T`, validating size and (per policy) the discriminator
pub fn decode_record<T: AccountRecord>(
    blob: &[u8],
    policy: DiscriminatorPolicy,
) -> Result<T, DecodeError> {
    let kind = T::KIND;
    if let Some(expected) = kind.account_len() {
        if blob.len() != expected {
            return Err(DecodeError::SizeMismatch {
                kind,
                expected,
                actual: blob.len(),
            });
        }
    }
    if blob.len() < DISCRIMINATOR_LEN {
        return Err(DecodeError::TruncatedBuffer {
            kind,
            needed: DISCRIMINATOR_LEN,
            available: blob.len(),
        });
    }

    let (tag, payload) = blob.split_at(DISCRIMINATOR_LEN);
    policy.check(kind, tag)?;

    let mut reader = FieldReader::new(kind, payload);
    let record = T::read_fields(&mut reader)?;
    reader.finish()?;
    Ok(record)
}

/// Marketplace-wide configuration (fees and treasury fan-out)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPool {
    #[serde(serialize_with = "ser_pubkey")]
    pub super_admin: Pubkey,
    /// Fee in permyriad applied to SOL trades
    pub market_fee_sol: u64,
    pub market_fee_token: u64,
    pub team_count: u64,
    #[serde(serialize_with = "ser_pubkeys")]
    pub team_treasury: Vec<Pubkey>,
    pub treasury_rate: Vec<u64>,
}

impl GlobalPool {
    /// Encode using the program's fixed 8-slot allocation
    pub fn encode_fixed_capacity(&self) -> Vec<u8> {
        let mut writer = FieldWriter::for_kind(RecordKind::GlobalPool);
        self.write_header(&mut writer);
        for slot in 0..MAX_TEAM_COUNT {
            writer.address(self.team_treasury.get(slot).unwrap_or(&Pubkey::default()));
        }
        for slot in 0..MAX_TEAM_COUNT {
            writer.u64(self.treasury_rate.get(slot).copied().unwrap_or(0));
        }
        writer.into_bytes()
    }

    fn write_header(&self, writer: &mut FieldWriter) {
        writer.address(&self.super_admin);
        writer.u64(self.market_fee_sol);
        writer.u64(self.market_fee_token);
        writer.u64(self.team_count);
    }

    /// Treasury addresses paired with their rates
    pub fn treasuries(&self) -> impl Iterator<Item = (&Pubkey, u64)> + '_ {
        self.team_treasury
            .iter()
            .zip(self.treasury_rate.iter().copied())
    }
}

impl AccountRecord for GlobalPool {
    const KIND: RecordKind = RecordKind::GlobalPool;

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
        let kind = Self::KIND;
        let super_admin = reader.address()?;
        let market_fee_sol = reader.u64()?;
        let market_fee_token = reader.u64()?;
        let team_count = reader.u64()?;

        let header_len = super::layout::fixed_len(GLOBAL_POOL_FIELDS);
        let slot_len = ADDRESS_LEN + U64_LEN;
        let fixed_capacity = reader.payload_len() == GLOBAL_POOL_FIXED_PAYLOAD_LEN;

        let count = usize::try_from(team_count).unwrap_or(usize::MAX);
        let slots = if fixed_capacity {
            if count > MAX_TEAM_COUNT {
                return Err(DecodeError::InvalidTeamCount { kind, count: team_count });
            }
            MAX_TEAM_COUNT
        } else {
            let expected = count
                .checked_mul(slot_len)
                .and_then(|arrays| arrays.checked_add(header_len))
                .ok_or(DecodeError::InvalidTeamCount { kind, count: team_count })?;
            if reader.payload_len() != expected {
                return Err(DecodeError::SizeMismatch {
                    kind,
                    expected: DISCRIMINATOR_LEN + expected,
                    actual: DISCRIMINATOR_LEN + reader.payload_len(),
                });
            }
            count
        };

        let mut team_treasury = Vec::with_capacity(count);
        for slot in 0..slots {
            let address = reader.address()?;
            if slot < count {
                team_treasury.push(address);
            }
        }
        let mut treasury_rate = Vec::with_capacity(count);
        for slot in 0..slots {
            let rate = reader.u64()?;
            if slot < count {
                treasury_rate.push(rate);
            }
        }

        Ok(Self {
            super_admin,
            market_fee_sol,
            market_fee_token,
            team_count,
            team_treasury,
            treasury_rate,
        })
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        self.write_header(writer);
        for address in &self.team_treasury {
            writer.address(address);
        }
        for rate in &self.treasury_rate {
            writer.u64(*rate);
        }
    }
}

/// A fixed-price listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellData {
    #[serde(serialize_with = "ser_pubkey")]
    pub mint: Pubkey,
    #[serde(serialize_with = "ser_pubkey")]
    pub seller: Pubkey,
    #[serde(serialize_with = "ser_pubkey")]
    pub collection: Pubkey,
    pub price_sol: u64,
    pub price_token: u64,
    pub listed_date: u64,
    pub active: bool,
}

impl SellData {
    pub fn listed_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.listed_date)
    }
}

impl AccountRecord for SellData {
    const KIND: RecordKind = RecordKind::SellData;

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            mint: reader.address()?,
            seller: reader.address()?,
            collection: reader.address()?,
            price_sol: reader.u64()?,
            price_token: reader.u64()?,
            listed_date: reader.u64()?,
            active: reader.flag()?,
        })
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.address(&self.mint);
        writer.address(&self.seller);
        writer.address(&self.collection);
        writer.u64(self.price_sol);
        writer.u64(self.price_token);
        writer.u64(self.listed_date);
        writer.flag(self.active);
    }
}

/// A standing offer from one buyer on one mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferData {
    #[serde(serialize_with = "ser_pubkey")]
    pub mint: Pubkey,
    #[serde(serialize_with = "ser_pubkey")]
    pub buyer: Pubkey,
    pub offer_price: u64,
    pub offer_listing_date: u64,
    pub by_token: bool,
    pub active: bool,
}

impl AccountRecord for OfferData {
    const KIND: RecordKind = RecordKind::OfferData;

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            mint: reader.address()?,
            buyer: reader.address()?,
            offer_price: reader.u64()?,
            offer_listing_date: reader.u64()?,
            by_token: reader.flag()?,
            active: reader.flag()?,
        })
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.address(&self.mint);
        writer.address(&self.buyer);
        writer.u64(self.offer_price);
        writer.u64(self.offer_listing_date);
        writer.flag(self.by_token);
        writer.flag(self.active);
    }
}

pub const AUCTION_STATUS_CANCELLED: u64 = 0;
pub const AUCTION_STATUS_LIVE: u64 = 1;
pub const AUCTION_STATUS_CLAIMED: u64 = 2;

/// Client-side view of where an auction stands
///
/// Derived from `status` and `last_bidder` only. Transitions are enforced by
/// the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuctionPhase {
    Created,
    Bidding,
    Claimed,
    Cancelled,
    Unknown(u64),
}

/// An English auction on one mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionData {
    #[serde(serialize_with = "ser_pubkey")]
    pub mint: Pubkey,
    #[serde(serialize_with = "ser_pubkey")]
    pub creator: Pubkey,
    pub start_price: u64,
    pub min_increase_amount: u64,
    pub by_token: bool,
    pub end_date: u64,
    pub last_bid_date: u64,
    /// All-zero when nobody has bid
    #[serde(serialize_with = "ser_pubkey")]
    pub last_bidder: Pubkey,
    pub highest_bid: u64,
    pub status: u64,
}

impl AuctionData {
    pub fn has_bid(&self) -> bool {
        self.last_bidder != Pubkey::default()
    }

    pub fn phase(&self) -> AuctionPhase {
        match self.status {
            AUCTION_STATUS_LIVE if self.has_bid() => AuctionPhase::Bidding,
            AUCTION_STATUS_LIVE => AuctionPhase::Created,
            AUCTION_STATUS_CLAIMED => AuctionPhase::Claimed,
            AUCTION_STATUS_CANCELLED => AuctionPhase::Cancelled,
            other => AuctionPhase::Unknown(other),
        }
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.end_date)
    }
}

impl AccountRecord for AuctionData {
    const KIND: RecordKind = RecordKind::AuctionData;

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            mint: reader.address()?,
            creator: reader.address()?,
            start_price: reader.u64()?,
            min_increase_amount: reader.u64()?,
            by_token: reader.flag()?,
            end_date: reader.u64()?,
            last_bid_date: reader.u64()?,
            last_bidder: reader.address()?,
            highest_bid: reader.u64()?,
            status: reader.u64()?,
        })
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.address(&self.mint);
        writer.address(&self.creator);
        writer.u64(self.start_price);
        writer.u64(self.min_increase_amount);
        writer.flag(self.by_token);
        writer.u64(self.end_date);
        writer.u64(self.last_bid_date);
        writer.address(&self.last_bidder);
        writer.u64(self.highest_bid);
        writer.u64(self.status);
    }
}

/// Per-user trading volume and escrow balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(serialize_with = "ser_pubkey")]
    pub address: Pubkey,
    pub traded_volume: u64,
    pub traded_token_volume: u64,
    pub escrow_sol_balance: u64,
    pub escrow_token_balance: u64,
}

impl AccountRecord for UserData {
    const KIND: RecordKind = RecordKind::UserData;

    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            address: reader.address()?,
            traded_volume: reader.u64()?,
            traded_token_volume: reader.u64()?,
            escrow_sol_balance: reader.u64()?,
            escrow_token_balance: reader.u64()?,
        })
    }

    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.address(&self.address);
        writer.u64(self.traded_volume);
        writer.u64(self.traded_token_volume);
        writer.u64(self.escrow_sol_balance);
        writer.u64(self.escrow_token_balance);
    }
}

/// Any decoded record, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Record {
    GlobalPool(GlobalPool),
    SellData(SellData),
    OfferData(OfferData),
    AuctionData(AuctionData),
    UserData(UserData),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::GlobalPool(_) => RecordKind::GlobalPool,
            Record::SellData(_) => RecordKind::SellData,
            Record::OfferData(_) => RecordKind::OfferData,
            Record::AuctionData(_) => RecordKind::AuctionData,
            Record::UserData(_) => RecordKind::UserData,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Record::GlobalPool(r) => r.encode(),
            Record::SellData(r) => r.encode(),
            Record::OfferData(r) => r.encode(),
            Record::AuctionData(r) => r.encode(),
            Record::UserData(r) => r.encode(),
        }
    }
}

/// Decode a blob of the given kind into a [`Record`]
pub fn decode(
    blob: &[u8],
    kind: RecordKind,
    policy: DiscriminatorPolicy,
) -> Result<Record, DecodeError> {
    Ok(match kind {
        RecordKind::GlobalPool => Record::GlobalPool(decode_record(blob, policy)?),
        RecordKind::SellData => Record::SellData(decode_record(blob, policy)?),
        RecordKind::OfferData => Record::OfferData(decode_record(blob, policy)?),
        RecordKind::AuctionData => Record::AuctionData(decode_record(blob, policy)?),
        RecordKind::UserData => Record::UserData(decode_record(blob, policy)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_sell() -> SellData {
        SellData {
            mint: Pubkey::new_unique(),
            seller: Pubkey::new_unique(),
            collection: Pubkey::new_unique(),
            price_sol: 1_000_000_000,
            price_token: 42,
            listed_date: 1_650_000_000,
            active: true,
        }
    }

    fn sample_auction(last_bidder: Pubkey, status: u64) -> AuctionData {
        AuctionData {
            mint: Pubkey::new_unique(),
            creator: Pubkey::new_unique(),
            start_price: 500,
            min_increase_amount: 10,
            by_token: false,
            end_date: 1_700_000_000,
            last_bid_date: 0,
            last_bidder,
            highest_bid: 0,
            status,
        }
    }

    fn sample_global(team: usize) -> GlobalPool {
        GlobalPool {
            super_admin: Pubkey::new_unique(),
            market_fee_sol: 250,
            market_fee_token: 100,
            team_count: team as u64,
            team_treasury: (0..team).map(|_| Pubkey::new_unique()).collect(),
            treasury_rate: (0..team).map(|i| 1000 * (i as u64 + 1)).collect(),
        }
    }

    fn all_samples() -> Vec<Record> {
        vec![
            Record::GlobalPool(sample_global(3)),
            Record::SellData(sample_sell()),
            Record::OfferData(OfferData {
                mint: Pubkey::new_unique(),
                buyer: Pubkey::new_unique(),
                offer_price: 7,
                offer_listing_date: 9,
                by_token: true,
                active: true,
            }),
            Record::AuctionData(sample_auction(Pubkey::new_unique(), AUCTION_STATUS_LIVE)),
            Record::UserData(UserData {
                address: Pubkey::new_unique(),
                traded_volume: 1,
                traded_token_volume: 2,
                escrow_sol_balance: 3,
                escrow_token_balance: 4,
            }),
        ]
    }

    #[test]
    fn test_round_trip_every_kind() {
        for record in all_samples() {
            let blob = record.encode();
            let decoded = decode(&blob, record.kind(), DiscriminatorPolicy::Verify).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_one_byte_short_fails_for_every_kind() {
        for record in all_samples() {
            let blob = record.encode();
            let short = &blob[..blob.len() - 1];
            let err = decode(short, record.kind(), DiscriminatorPolicy::Skip).unwrap_err();
            assert!(
                matches!(err, DecodeError::SizeMismatch { .. } | DecodeError::TruncatedBuffer { .. }),
                "{} decoded a short blob: {err:?}",
                record.kind()
            );
        }
    }

    #[test]
    fn test_blob_sizes_match_program_allocation() {
        assert_eq!(sample_sell().encode().len(), 136);
        assert_eq!(sample_auction(Pubkey::default(), 1).encode().len(), 160);
        assert_eq!(sample_global(0).encode().len(), 64);
        assert_eq!(sample_global(2).encode().len(), 64 + 80);
    }

    #[test]
    fn test_sell_data_field_values() {
        let sell = sample_sell();
        let decoded = SellData::decode(&sell.encode(), DiscriminatorPolicy::Skip).unwrap();
        assert_eq!(decoded.price_sol, 1_000_000_000);
        assert_eq!(decoded.price_token, 42);
        assert!(decoded.active);
        assert_eq!(
            decoded.listed_at().map(|t| t.timestamp()),
            Some(1_650_000_000)
        );
    }

    #[test]
    fn test_boolean_is_nonzero() {
        let mut blob = sample_sell().encode();
        // active flag is the last u64 of the blob
        let flag_at = blob.len() - 8;
        blob[flag_at..].copy_from_slice(&5u64.to_le_bytes());
        assert!(SellData::decode(&blob, DiscriminatorPolicy::Skip).unwrap().active);

        blob[flag_at..].copy_from_slice(&0u64.to_le_bytes());
        assert!(!SellData::decode(&blob, DiscriminatorPolicy::Skip).unwrap().active);
    }

    #[test]
    fn test_skip_policy_ignores_tag() {
        let mut blob = sample_sell().encode();
        blob[..8].copy_from_slice(&[0xAA; 8]);
        assert!(SellData::decode(&blob, DiscriminatorPolicy::Skip).is_ok());
        assert!(matches!(
            SellData::decode(&blob, DiscriminatorPolicy::Verify),
            Err(DecodeError::DiscriminatorMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_kind_size_mismatch() {
        let blob = sample_sell().encode();
        assert_eq!(
            OfferData::decode(&blob, DiscriminatorPolicy::Skip),
            Err(DecodeError::SizeMismatch {
                kind: RecordKind::OfferData,
                expected: 104,
                actual: 136,
            })
        );
    }

    #[test]
    fn test_global_pool_fixed_capacity() {
        let global = sample_global(2);
        let blob = global.encode_fixed_capacity();
        assert_eq!(blob.len(), 8 + GLOBAL_POOL_FIXED_PAYLOAD_LEN);

        let decoded = GlobalPool::decode(&blob, DiscriminatorPolicy::Verify).unwrap();
        assert_eq!(decoded, global);
        assert_eq!(decoded.treasuries().count(), 2);
    }

    #[test]
    fn test_global_pool_rejects_oversized_team_count() {
        let mut global = sample_global(2);
        global.team_count = 9;
        let blob = global.encode_fixed_capacity();
        assert!(matches!(
            GlobalPool::decode(&blob, DiscriminatorPolicy::Skip),
            Err(DecodeError::InvalidTeamCount { count: 9, .. })
        ));
    }

    #[test]
    fn test_global_pool_compact_count_mismatch() {
        let mut global = sample_global(2);
        global.team_count = 3;
        let blob = global.encode();
        assert!(matches!(
            GlobalPool::decode(&blob, DiscriminatorPolicy::Skip),
            Err(DecodeError::SizeMismatch { expected: 184, actual: 144, .. })
        ));
    }

    #[test]
    fn test_auction_phase() {
        assert_eq!(
            sample_auction(Pubkey::default(), AUCTION_STATUS_LIVE).phase(),
            AuctionPhase::Created
        );
        assert_eq!(
            sample_auction(Pubkey::new_unique(), AUCTION_STATUS_LIVE).phase(),
            AuctionPhase::Bidding
        );
        assert_eq!(
            sample_auction(Pubkey::new_unique(), AUCTION_STATUS_CLAIMED).phase(),
            AuctionPhase::Claimed
        );
        assert_eq!(
            sample_auction(Pubkey::default(), AUCTION_STATUS_CANCELLED).phase(),
            AuctionPhase::Cancelled
        );
        assert_eq!(
            sample_auction(Pubkey::default(), 7).phase(),
            AuctionPhase::Unknown(7)
        );
    }

    #[test]
    fn test_serialized_addresses_are_base58() {
        let sell = sample_sell();
        let json = serde_json::to_value(&sell).unwrap();
        assert_eq!(json["seller"], sell.seller.to_string());
        assert_eq!(json["priceSol"], 1_000_000_000u64);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_user_data_round_trip(
            address in any::<[u8; 32]>(),
            volumes in any::<[u64; 4]>(),
        ) {
            let user = UserData {
                address: Pubkey::new_from_array(address),
                traded_volume: volumes[0],
                traded_token_volume: volumes[1],
                escrow_sol_balance: volumes[2],
                escrow_token_balance: volumes[3],
            };
            let decoded = UserData::decode(&user.encode(), DiscriminatorPolicy::Verify).unwrap();
            prop_assert_eq!(decoded, user);
        }

        #[test]
        fn prop_truncated_blobs_never_decode(cut in 1usize..160) {
            let blob = sample_auction(Pubkey::default(), AUCTION_STATUS_LIVE).encode();
            let short = &blob[..blob.len() - cut];
            prop_assert!(AuctionData::decode(short, DiscriminatorPolicy::Skip).is_err());
        }
    }
}
