//! On-chain record model
//!
//! Binary layouts, typed records and the reader that fetches them.
//!
//! ## Key Features
//!
//! - **Declarative layouts**: one static field table per record kind drives
//!   size checks, scan filter offsets, decoding and encoding
//! - **Exact size validation**: a blob one byte off never decodes
//! - **Discriminator policy**: skip the 8-byte tag or verify it against the
//!   Anchor account discriminator
//! - **Lossy scans**: undecodable accounts are dropped and counted

pub mod layout;
pub mod reader;
pub mod records;

pub use layout::{DecodeError, DiscriminatorPolicy, RecordKind};
pub use reader::{ReadError, ScanResult, StateReader};
pub use records::{
    decode, AccountRecord, AuctionData, AuctionPhase, GlobalPool, OfferData, Record, SellData,
    UserData,
};
