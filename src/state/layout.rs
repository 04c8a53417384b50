//! Declarative record layouts and byte-level primitives
//!
//! Each record kind is described by a static field table. Payload sizes and
//! field offsets (used by scan filters) are computed from the table, and the
//! same table drives both decoding and the symmetric encoder.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub const DISCRIMINATOR_LEN: usize = 8;
pub const ADDRESS_LEN: usize = 32;
pub const U64_LEN: usize = 8;

/// Treasury slots allocated by the program in the global record
pub const MAX_TEAM_COUNT: usize = 8;

/// Payload length of the global record as allocated on chain (8 slots)
pub const GLOBAL_POOL_FIXED_PAYLOAD_LEN: usize =
    fixed_len(GLOBAL_POOL_FIELDS) + MAX_TEAM_COUNT * (ADDRESS_LEN + U64_LEN);

/// Primitive type of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Address,
    U64,
    /// u64 carrying 0 or 1
    Flag,
    /// `teamCount` addresses
    AddressArray,
    /// `teamCount` u64 values
    U64Array,
}

impl FieldType {
    /// Width in bytes; variable-length arrays report zero
    pub const fn width(self) -> usize {
        match self {
            FieldType::Address => ADDRESS_LEN,
            FieldType::U64 | FieldType::Flag => U64_LEN,
            FieldType::AddressArray | FieldType::U64Array => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldSpec {
    pub const fn address(name: &'static str) -> Self {
        Self { name, ty: FieldType::Address }
    }

    pub const fn u64(name: &'static str) -> Self {
        Self { name, ty: FieldType::U64 }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self { name, ty: FieldType::Flag }
    }

    pub const fn address_array(name: &'static str) -> Self {
        Self { name, ty: FieldType::AddressArray }
    }

    pub const fn u64_array(name: &'static str) -> Self {
        Self { name, ty: FieldType::U64Array }
    }
}

pub const GLOBAL_POOL_FIELDS: &[FieldSpec] = &[
    FieldSpec::address("super_admin"),
    FieldSpec::u64("market_fee_sol"),
    FieldSpec::u64("market_fee_token"),
    FieldSpec::u64("team_count"),
    FieldSpec::address_array("team_treasury"),
    FieldSpec::u64_array("treasury_rate"),
];

pub const SELL_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::address("mint"),
    FieldSpec::address("seller"),
    FieldSpec::address("collection"),
    FieldSpec::u64("price_sol"),
    FieldSpec::u64("price_token"),
    FieldSpec::u64("listed_date"),
    FieldSpec::flag("active"),
];

pub const OFFER_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::address("mint"),
    FieldSpec::address("buyer"),
    FieldSpec::u64("offer_price"),
    FieldSpec::u64("offer_listing_date"),
    FieldSpec::flag("by_token"),
    FieldSpec::flag("active"),
];

pub const AUCTION_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::address("mint"),
    FieldSpec::address("creator"),
    FieldSpec::u64("start_price"),
    FieldSpec::u64("min_increase_amount"),
    FieldSpec::flag("by_token"),
    FieldSpec::u64("end_date"),
    FieldSpec::u64("last_bid_date"),
    FieldSpec::address("last_bidder"),
    FieldSpec::u64("highest_bid"),
    FieldSpec::u64("status"),
];

pub const USER_DATA_FIELDS: &[FieldSpec] = &[
    FieldSpec::address("address"),
    FieldSpec::u64("traded_volume"),
    FieldSpec::u64("traded_token_volume"),
    FieldSpec::u64("escrow_sol_balance"),
    FieldSpec::u64("escrow_token_balance"),
];

/// Sum of the fixed-width fields of a layout
pub const fn fixed_len(fields: &[FieldSpec]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].ty.width();
        i += 1;
    }
    total
}

/// Payload offset of a fixed-position field, if it precedes any array
pub fn field_offset(fields: &[FieldSpec], name: &str) -> Option<usize> {
    let mut offset = 0;
    for field in fields {
        if field.name == name {
            return Some(offset);
        }
        if field.ty.width() == 0 {
            return None;
        }
        offset += field.ty.width();
    }
    None
}

/// The five record kinds published by the marketplace program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    GlobalPool,
    SellData,
    OfferData,
    AuctionData,
    UserData,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::GlobalPool,
        RecordKind::SellData,
        RecordKind::OfferData,
        RecordKind::AuctionData,
        RecordKind::UserData,
    ];

    /// Account type name as declared by the program
    pub fn account_name(self) -> &'static str {
        match self {
            RecordKind::GlobalPool => "GlobalPool",
            RecordKind::SellData => "SellData",
            RecordKind::OfferData => "OfferData",
            RecordKind::AuctionData => "AuctionData",
            RecordKind::UserData => "UserData",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            RecordKind::GlobalPool => GLOBAL_POOL_FIELDS,
            RecordKind::SellData => SELL_DATA_FIELDS,
            RecordKind::OfferData => OFFER_DATA_FIELDS,
            RecordKind::AuctionData => AUCTION_DATA_FIELDS,
            RecordKind::UserData => USER_DATA_FIELDS,
        }
    }

    /// Exact payload length, or `None` when it depends on `teamCount`
    pub fn payload_len(self) -> Option<usize> {
        match self {
            RecordKind::GlobalPool => None,
            kind => Some(fixed_len(kind.fields())),
        }
    }

    /// Exact account length including the discriminator
    pub fn account_len(self) -> Option<usize> {
        self.payload_len().map(|len| DISCRIMINATOR_LEN + len)
    }

    /// Offset of a named field within the whole account blob
    pub fn blob_offset(self, field: &str) -> Option<usize> {
        field_offset(self.fields(), field).map(|offset| DISCRIMINATOR_LEN + offset)
    }

    /// Anchor account discriminator: `sha256("account:<Name>")[..8]`
    pub fn discriminator(self) -> [u8; DISCRIMINATOR_LEN] {
        let digest = Sha256::digest(format!("account:{}", self.account_name()).as_bytes());
        let mut tag = [0u8; DISCRIMINATOR_LEN];
        tag.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
        tag
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.account_name())
    }
}

/// Whether the leading 8-byte tag is checked against the expected kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscriminatorPolicy {
    /// Skip the tag without looking at it
    #[default]
    Skip,
    /// Reject records whose tag does not match their kind
    Verify,
}

impl DiscriminatorPolicy {
    pub fn check(self, kind: RecordKind, tag: &[u8]) -> Result<(), DecodeError> {
        if self == DiscriminatorPolicy::Skip {
            return Ok(());
        }
        let expected = kind.discriminator();
        if tag != expected {
            let mut found = [0u8; DISCRIMINATOR_LEN];
            let n = tag.len().min(DISCRIMINATOR_LEN);
            found[..n].copy_from_slice(&tag[..n]);
            return Err(DecodeError::DiscriminatorMismatch {
                kind,
                expected,
                found,
            });
        }
        Ok(())
    }
}

/// Errors produced while decoding a record blob
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{kind} size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        kind: RecordKind,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} buffer truncated: needed {needed} bytes, {available} available")]
    TruncatedBuffer {
        kind: RecordKind,
        needed: usize,
        available: usize,
    },

    #[error("{kind} discriminator mismatch: expected {expected:?}, found {found:?}")]
    DiscriminatorMismatch {
        kind: RecordKind,
        expected: [u8; DISCRIMINATOR_LEN],
        found: [u8; DISCRIMINATOR_LEN],
    },

    #[error("{kind} team count {count} exceeds capacity {max}", max = MAX_TEAM_COUNT)]
    InvalidTeamCount { kind: RecordKind, count: u64 },
}

/// Little-endian u64 from an 8-byte window
///
/// The window is reversed and then read big-endian, which is the same value
/// `u64::from_le_bytes` produces on every host.
#[inline]
pub fn le_u64(window: [u8; U64_LEN]) -> u64 {
    let mut reversed = window;
    reversed.reverse();
    u64::from_be_bytes(reversed)
}

/// Cursor over a record payload (discriminator already stripped)
#[derive(Debug)]
pub struct FieldReader<'a> {
    kind: RecordKind,
    payload: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(kind: RecordKind, payload: &'a [u8]) -> Self {
        Self {
            kind,
            payload,
            pos: 0,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Total payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TruncatedBuffer {
                kind: self.kind,
                needed: DISCRIMINATOR_LEN + self.pos + n,
                available: DISCRIMINATOR_LEN + self.payload.len(),
            });
        }
        let window = &self.payload[self.pos..self.pos + n];
        self.pos += n;
        Ok(window)
    }

    pub fn address(&mut self) -> Result<Pubkey, DecodeError> {
        let window = self.take(ADDRESS_LEN)?;
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(window);
        Ok(Pubkey::new_from_array(bytes))
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        let window = self.take(U64_LEN)?;
        let mut bytes = [0u8; U64_LEN];
        bytes.copy_from_slice(window);
        Ok(le_u64(bytes))
    }

    pub fn flag(&mut self) -> Result<bool, DecodeError> {
        self.u64().map(|value| value != 0)
    }

    /// Fail unless every payload byte was consumed
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.remaining() != 0 {
            return Err(DecodeError::SizeMismatch {
                kind: self.kind,
                expected: DISCRIMINATOR_LEN + self.pos,
                actual: DISCRIMINATOR_LEN + self.payload.len(),
            });
        }
        Ok(())
    }
}

/// Append-only writer mirroring [`FieldReader`]
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    /// Start a blob for `kind`, sized for its full on-chain allocation
    pub fn for_kind(kind: RecordKind) -> Self {
        let payload = kind.payload_len().unwrap_or(GLOBAL_POOL_FIXED_PAYLOAD_LEN);
        let mut buf = Vec::with_capacity(DISCRIMINATOR_LEN + payload);
        buf.extend_from_slice(&kind.discriminator());
        Self { buf }
    }

    pub fn address(&mut self, value: &Pubkey) {
        self.buf.extend_from_slice(value.as_ref());
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn flag(&mut self, value: bool) {
        self.u64(u64::from(value));
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_u64_matches_native_conversion() {
        let window = [0x00, 0xca, 0x9a, 0x3b, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(le_u64(window), 1_000_000_000);
        assert_eq!(le_u64(window), u64::from_le_bytes(window));
        assert_eq!(le_u64([0xff; 8]), u64::MAX);
        assert_eq!(le_u64([1, 0, 0, 0, 0, 0, 0, 0]), 1);
    }

    #[test]
    fn test_payload_sizes() {
        assert_eq!(RecordKind::SellData.payload_len(), Some(128));
        assert_eq!(RecordKind::OfferData.payload_len(), Some(96));
        assert_eq!(RecordKind::AuctionData.payload_len(), Some(152));
        assert_eq!(RecordKind::UserData.payload_len(), Some(64));
        assert_eq!(RecordKind::GlobalPool.payload_len(), None);

        assert_eq!(RecordKind::SellData.account_len(), Some(136));
        assert_eq!(RecordKind::OfferData.account_len(), Some(104));
        assert_eq!(RecordKind::AuctionData.account_len(), Some(160));
        assert_eq!(GLOBAL_POOL_FIXED_PAYLOAD_LEN, 376);
    }

    #[test]
    fn test_field_offsets() {
        assert_eq!(RecordKind::OfferData.blob_offset("mint"), Some(8));
        assert_eq!(RecordKind::OfferData.blob_offset("buyer"), Some(40));
        assert_eq!(RecordKind::SellData.blob_offset("price_sol"), Some(104));
        assert_eq!(RecordKind::AuctionData.blob_offset("last_bidder"), Some(112));
        // Fields after a variable-length array have no fixed offset
        assert_eq!(RecordKind::GlobalPool.blob_offset("treasury_rate"), None);
        assert_eq!(RecordKind::GlobalPool.blob_offset("team_count"), Some(56));
        assert_eq!(RecordKind::SellData.blob_offset("missing"), None);
    }

    #[test]
    fn test_discriminators_are_distinct() {
        let tags: Vec<_> = RecordKind::ALL.iter().map(|k| k.discriminator()).collect();
        for (i, a) in tags.iter().enumerate() {
            for b in tags.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_discriminator_policy() {
        let tag = RecordKind::SellData.discriminator();
        assert!(DiscriminatorPolicy::Verify
            .check(RecordKind::SellData, &tag)
            .is_ok());
        assert!(matches!(
            DiscriminatorPolicy::Verify.check(RecordKind::OfferData, &tag),
            Err(DecodeError::DiscriminatorMismatch { kind: RecordKind::OfferData, .. })
        ));
        assert!(DiscriminatorPolicy::Skip
            .check(RecordKind::OfferData, &[0u8; 8])
            .is_ok());
    }

    #[test]
    fn test_writer_preallocates_account_len() {
        for kind in RecordKind::ALL {
            let writer = FieldWriter::for_kind(kind);
            let expected = kind
                .account_len()
                .unwrap_or(DISCRIMINATOR_LEN + GLOBAL_POOL_FIXED_PAYLOAD_LEN);
            assert!(writer.buf.capacity() >= expected, "{kind:?}");
            assert_eq!(writer.buf, kind.discriminator().to_vec());
        }
    }

    #[test]
    fn test_reader_truncation() {
        let payload = [0u8; 12];
        let mut reader = FieldReader::new(RecordKind::UserData, &payload);
        assert!(reader.u64().is_ok());
        assert_eq!(
            reader.u64(),
            Err(DecodeError::TruncatedBuffer {
                kind: RecordKind::UserData,
                needed: 24,
                available: 20,
            })
        );
    }
}
