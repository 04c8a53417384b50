//! Program-derived address derivation
//!
//! Every marketplace record lives at an address derived from a fixed seed
//! prefix plus a distinguishing key. The derivation is pure and
//! deterministic, so it can run on any thread without coordination.
//!
//! ## Seed tuples
//! - global authority: `["global-authority-v1"]`
//! - escrow vault: `["escrow-vault"]`
//! - sell record: `["sell-info-v1", mint]`
//! - offer record: `["offer-info-v1", mint, buyer]`
//! - user record: `["user-info-v1", owner]`
//! - auction record: `["auction-info-v1", mint]`
//!
//! The bump returned alongside each address must be passed verbatim to every
//! instruction that references the address.

use solana_sdk::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};
use thiserror::Error;

pub const GLOBAL_AUTHORITY_SEED: &[u8] = b"global-authority-v1";
pub const ESCROW_VAULT_SEED: &[u8] = b"escrow-vault";
pub const SELL_DATA_SEED: &[u8] = b"sell-info-v1";
pub const OFFER_DATA_SEED: &[u8] = b"offer-info-v1";
pub const USER_DATA_SEED: &[u8] = b"user-info-v1";
pub const AUCTION_DATA_SEED: &[u8] = b"auction-info-v1";
pub const METADATA_SEED: &[u8] = b"metadata";

/// Token metadata program that owns NFT metadata accounts
pub const METADATA_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Errors raised while deriving an address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    /// A single seed exceeds the 32-byte limit
    #[error("Seed {index} is {len} bytes (max {max})", max = MAX_SEED_LEN)]
    SeedTooLong { index: usize, len: usize },

    /// Too many seeds to leave room for the bump byte
    #[error("Too many seeds: {count} (max {max})", max = MAX_SEEDS - 1)]
    TooManySeeds { count: usize },

    /// No bump in 0..=255 produced an off-curve address
    #[error("No viable bump found for program {program_id}")]
    NoViableBump { program_id: Pubkey },
}

/// A derived address together with the bump that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Derived {
    pub address: Pubkey,
    pub bump: u8,
}

/// Derive a program address from an ordered list of seed parts
///
/// Validates seed lengths before searching so oversized input fails with a
/// typed error instead of a panic inside the runtime helper.
pub fn derive(seed_parts: &[&[u8]], program_id: &Pubkey) -> Result<Derived, DeriveError> {
    if seed_parts.len() >= MAX_SEEDS {
        return Err(DeriveError::TooManySeeds {
            count: seed_parts.len(),
        });
    }
    if let Some((index, seed)) = seed_parts
        .iter()
        .enumerate()
        .find(|(_, seed)| seed.len() > MAX_SEED_LEN)
    {
        return Err(DeriveError::SeedTooLong {
            index,
            len: seed.len(),
        });
    }

    Pubkey::try_find_program_address(seed_parts, program_id)
        .map(|(address, bump)| Derived { address, bump })
        .ok_or(DeriveError::NoViableBump {
            program_id: *program_id,
        })
}

/// Address book for one marketplace deployment
///
/// Holds the program identity explicitly; nothing here reads process-wide
/// state, so several deployments can be addressed side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAddresses {
    program_id: Pubkey,
}

impl MarketAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// Global authority PDA (also the NFT custodian while listed or auctioned)
    pub fn global_authority(&self) -> Result<Derived, DeriveError> {
        derive(&[GLOBAL_AUTHORITY_SEED], &self.program_id)
    }

    /// Escrow vault PDA holding escrowed SOL and owning the escrow token account
    pub fn escrow_vault(&self) -> Result<Derived, DeriveError> {
        derive(&[ESCROW_VAULT_SEED], &self.program_id)
    }

    pub fn sell_data(&self, mint: &Pubkey) -> Result<Derived, DeriveError> {
        derive(&[SELL_DATA_SEED, mint.as_ref()], &self.program_id)
    }

    pub fn offer_data(&self, mint: &Pubkey, buyer: &Pubkey) -> Result<Derived, DeriveError> {
        derive(
            &[OFFER_DATA_SEED, mint.as_ref(), buyer.as_ref()],
            &self.program_id,
        )
    }

    pub fn user_data(&self, owner: &Pubkey) -> Result<Derived, DeriveError> {
        derive(&[USER_DATA_SEED, owner.as_ref()], &self.program_id)
    }

    pub fn auction_data(&self, mint: &Pubkey) -> Result<Derived, DeriveError> {
        derive(&[AUCTION_DATA_SEED, mint.as_ref()], &self.program_id)
    }

    /// Metadata account of an NFT mint, derived under the metadata program
    pub fn metadata(&self, mint: &Pubkey) -> Result<Derived, DeriveError> {
        derive(
            &[METADATA_SEED, METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
            &METADATA_PROGRAM_ID,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derive_matches_runtime_helper() {
        let program_id = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let derived = derive(&[SELL_DATA_SEED, mint.as_ref()], &program_id).unwrap();
        let (expected, bump) =
            Pubkey::find_program_address(&[SELL_DATA_SEED, mint.as_ref()], &program_id);

        assert_eq!(derived.address, expected);
        assert_eq!(derived.bump, bump);
        assert!(!derived.address.is_on_curve());
    }

    #[test]
    fn test_seed_too_long() {
        let program_id = Pubkey::new_unique();
        let long_seed = [7u8; MAX_SEED_LEN + 1];

        let err = derive(&[b"ok", &long_seed], &program_id).unwrap_err();
        assert_eq!(
            err,
            DeriveError::SeedTooLong {
                index: 1,
                len: MAX_SEED_LEN + 1
            }
        );
    }

    #[test]
    fn test_too_many_seeds() {
        let program_id = Pubkey::new_unique();
        let seeds: Vec<&[u8]> = vec![b"x".as_slice(); MAX_SEEDS];

        assert!(matches!(
            derive(&seeds, &program_id),
            Err(DeriveError::TooManySeeds { count }) if count == MAX_SEEDS
        ));
    }

    #[test]
    fn test_distinct_keys_distinct_addresses() {
        let addresses = MarketAddresses::new(Pubkey::new_unique());
        let mint = Pubkey::new_unique();
        let buyer_a = Pubkey::new_unique();
        let buyer_b = Pubkey::new_unique();

        let a = addresses.offer_data(&mint, &buyer_a).unwrap();
        let b = addresses.offer_data(&mint, &buyer_b).unwrap();
        assert_ne!(a.address, b.address);

        // Same key under different prefixes never collides
        let sell = addresses.sell_data(&mint).unwrap();
        let auction = addresses.auction_data(&mint).unwrap();
        assert_ne!(sell.address, auction.address);
    }

    #[test]
    fn test_metadata_uses_metadata_program() {
        let addresses = MarketAddresses::new(Pubkey::new_unique());
        let mint = Pubkey::new_unique();

        let (expected, _) = Pubkey::find_program_address(
            &[b"metadata", METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
            &METADATA_PROGRAM_ID,
        );
        assert_eq!(addresses.metadata(&mint).unwrap().address, expected);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_derive_is_deterministic(
            program in any::<[u8; 32]>(),
            key in any::<[u8; 32]>(),
            prefix in proptest::collection::vec(any::<u8>(), 0..=32),
        ) {
            let program_id = Pubkey::new_from_array(program);
            let first = derive(&[&prefix, &key], &program_id).unwrap();
            let second = derive(&[&prefix, &key], &program_id).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
