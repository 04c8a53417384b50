//! Auxiliary token account resolution
//!
//! Operations reference token accounts that may not exist yet. The resolver
//! computes the canonical associated account for (owner, mint), checks the
//! ledger, and hands back a creation instruction when one is needed. The
//! caller prepends those instructions ahead of the program instruction.
//!
//! Three policies sit on top of the basic lookup:
//! - currency accounts of the acting party fall back to any token account
//!   the owner holds for the mint, and are never created when the operation
//!   pays in the token
//! - NFT custody follows the current holder when the owner's canonical
//!   account is gone
//! - treasury fan-out maps wallet addresses to token accounts without I/O

use std::sync::Arc;

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::solana_program::{program_error::ProgramError, program_pack::Pack};
use spl_token::state::Account as TokenAccount;
use tracing::{debug, instrument};

use crate::ledger::{LedgerClient, LedgerError};
use crate::market::MarketError;

/// An account address plus the instruction creating it, if absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub address: Pubkey,
    pub create_instruction: Option<Instruction>,
}

impl ResolvedAccount {
    pub fn existing(address: Pubkey) -> Self {
        Self {
            address,
            create_instruction: None,
        }
    }

    pub fn needs_creation(&self) -> bool {
        self.create_instruction.is_some()
    }
}

/// Mint, owner and amount of a token account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountView {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// Unpack an initialized SPL token account
///
/// Wrong-sized and uninitialized accounts are rejected.
pub fn parse_token_account(data: &[u8]) -> Result<TokenAccountView, ProgramError> {
    let account = TokenAccount::unpack(data)?;
    Ok(TokenAccountView {
        mint: account.mint,
        owner: account.owner,
        amount: account.amount,
    })
}

/// Canonical associated token account of `owner` for `mint`
pub fn associated_account(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(owner, mint)
}

/// Idempotent creation of the canonical account, funded by `payer`
pub fn create_account_instruction(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    create_associated_token_account_idempotent(payer, owner, mint, &spl_token::id())
}

/// Trailing treasury accounts for a payout
///
/// Token payouts go to each treasury's canonical token account; SOL payouts go
/// to the wallets themselves. Returns a new list in caller order.
pub fn treasury_targets(treasuries: &[Pubkey], by_token: bool, token_mint: &Pubkey) -> Vec<Pubkey> {
    if by_token {
        treasuries
            .iter()
            .map(|treasury| associated_account(treasury, token_mint))
            .collect()
    } else {
        treasuries.to_vec()
    }
}

/// Ledger-backed resolver for one marketplace deployment
pub struct AccountResolver<L: LedgerClient> {
    ledger: Arc<L>,
    token_mint: Pubkey,
}

impl<L: LedgerClient> Clone for AccountResolver<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            token_mint: self.token_mint,
        }
    }
}

impl<L: LedgerClient> AccountResolver<L> {
    pub fn new(ledger: Arc<L>, token_mint: Pubkey) -> Self {
        Self { ledger, token_mint }
    }

    pub fn token_mint(&self) -> Pubkey {
        self.token_mint
    }

    /// Canonical account of `owner` for `mint`, with creation if absent
    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    pub async fn resolve_ata(
        &self,
        payer: &Pubkey,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<ResolvedAccount, MarketError> {
        let address = associated_account(owner, mint);
        if self.ledger.account_exists(&address).await? {
            return Ok(ResolvedAccount::existing(address));
        }
        debug!(address = %address, "Token account missing, adding creation");
        Ok(ResolvedAccount {
            address,
            create_instruction: Some(create_account_instruction(payer, owner, mint)),
        })
    }

    /// Marketplace currency account of the acting party
    ///
    /// Tries the canonical account, then any token account `owner` holds for
    /// the currency mint. When neither exists the canonical account is created
    /// unless the operation pays in the token, which fails instead.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn resolve_currency(
        &self,
        payer: &Pubkey,
        owner: &Pubkey,
        requires_token: bool,
    ) -> Result<ResolvedAccount, MarketError> {
        let canonical = associated_account(owner, &self.token_mint);
        if self.ledger.account_exists(&canonical).await? {
            return Ok(ResolvedAccount::existing(canonical));
        }

        let held = self
            .ledger
            .get_token_accounts_by_owner(owner, &self.token_mint)
            .await?;
        if let Some(address) = held.first() {
            debug!(address = %address, "Using non-canonical currency account");
            return Ok(ResolvedAccount::existing(*address));
        }

        if requires_token {
            return Err(MarketError::MissingTokenAccount {
                owner: *owner,
                mint: self.token_mint,
            });
        }
        Ok(ResolvedAccount {
            address: canonical,
            create_instruction: Some(create_account_instruction(payer, owner, &self.token_mint)),
        })
    }

    /// Token account currently holding `user`'s NFT
    ///
    /// Keeps the canonical account when it exists or when `custodian` (the
    /// marketplace authority) holds the NFT; substitutes the holder account
    /// when `user` owns it under a non-canonical address.
    #[instrument(skip(self), fields(user = %user, mint = %mint))]
    pub async fn resolve_nft_source(
        &self,
        user: &Pubkey,
        mint: &Pubkey,
        custodian: &Pubkey,
    ) -> Result<Pubkey, MarketError> {
        let canonical = associated_account(user, mint);
        if self.ledger.account_exists(&canonical).await? {
            return Ok(canonical);
        }

        let holders = self.ledger.get_token_largest_accounts(mint).await?;
        let Some(holding) = holders.iter().find(|h| h.amount > 0) else {
            return Err(MarketError::NotOwner {
                user: *user,
                mint: *mint,
                holder: None,
            });
        };

        let holder_owner = match self.ledger.get_account_data(&holding.address).await? {
            Some(data) => {
                parse_token_account(&data)
                    .map_err(|err| {
                        LedgerError::invalid_data(format!("token account {}", holding.address), err.to_string())
                    })?
                    .owner
            }
            None => {
                return Err(MarketError::NotOwner {
                    user: *user,
                    mint: *mint,
                    holder: None,
                })
            }
        };

        if holder_owner == *custodian {
            debug!("NFT already in marketplace custody");
            Ok(canonical)
        } else if holder_owner == *user {
            debug!(holder = %holding.address, "Using non-canonical NFT account");
            Ok(holding.address)
        } else {
            Err(MarketError::NotOwner {
                user: *user,
                mint: *mint,
                holder: Some(holder_owner),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TokenHolding;
    use crate::test_utils::{token_account_data, MockLedger};

    fn setup() -> (Arc<MockLedger>, AccountResolver<MockLedger>, Pubkey) {
        let ledger = Arc::new(MockLedger::new());
        let token_mint = Pubkey::new_unique();
        let resolver = AccountResolver::new(Arc::clone(&ledger), token_mint);
        (ledger, resolver, token_mint)
    }

    #[test]
    fn test_parse_token_account() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let data = token_account_data(&mint, &owner, 1);
        let view = parse_token_account(&data).unwrap();
        assert_eq!(view.mint, mint);
        assert_eq!(view.owner, owner);
        assert_eq!(view.amount, 1);
    }

    #[test]
    fn test_parse_token_account_rejects_non_accounts() {
        let data = token_account_data(&Pubkey::new_unique(), &Pubkey::new_unique(), 1);
        assert!(parse_token_account(&data[..TokenAccount::LEN - 1]).is_err());
        assert!(parse_token_account(&[7u8; 72]).is_err());
        assert_eq!(
            parse_token_account(&[0u8; TokenAccount::LEN]),
            Err(ProgramError::UninitializedAccount)
        );
    }

    #[test]
    fn test_treasury_targets_is_pure() {
        let mint = Pubkey::new_unique();
        let treasuries = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        let original = treasuries.clone();

        let sol = treasury_targets(&treasuries, false, &mint);
        assert_eq!(sol, treasuries);

        let token = treasury_targets(&treasuries, true, &mint);
        assert_eq!(token[0], associated_account(&treasuries[0], &mint));
        assert_eq!(token[1], associated_account(&treasuries[1], &mint));
        assert_eq!(treasuries, original);
    }

    #[tokio::test]
    async fn test_resolve_ata_existing_and_missing() {
        let (ledger, resolver, _) = setup();
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let missing = resolver.resolve_ata(&payer, &owner, &mint).await.unwrap();
        assert_eq!(missing.address, associated_account(&owner, &mint));
        let ix = missing.create_instruction.unwrap();
        assert_eq!(ix.program_id, spl_associated_token_account::id());
        assert_eq!(ix.accounts[0].pubkey, payer);

        ledger
            .add_token_account(missing.address, &mint, &owner, 0)
            .await;
        let existing = resolver.resolve_ata(&payer, &owner, &mint).await.unwrap();
        assert!(!existing.needs_creation());
    }

    #[tokio::test]
    async fn test_currency_fallback_to_owned_account() {
        let (ledger, resolver, token_mint) = setup();
        let owner = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        ledger.add_token_account(other, &token_mint, &owner, 10).await;

        let resolved = resolver.resolve_currency(&owner, &owner, true).await.unwrap();
        assert_eq!(resolved, ResolvedAccount::existing(other));
    }

    #[tokio::test]
    async fn test_currency_missing_by_mode() {
        let (_ledger, resolver, token_mint) = setup();
        let owner = Pubkey::new_unique();

        let sol = resolver.resolve_currency(&owner, &owner, false).await.unwrap();
        assert_eq!(sol.address, associated_account(&owner, &token_mint));
        assert!(sol.needs_creation());

        let err = resolver
            .resolve_currency(&owner, &owner, true)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::MissingTokenAccount { owner: o, .. } if o == owner));
    }

    #[tokio::test]
    async fn test_nft_custody() {
        let (ledger, resolver, _) = setup();
        let user = Pubkey::new_unique();
        let custodian = Pubkey::new_unique();
        let stranger = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let canonical = associated_account(&user, &mint);

        // Nobody holds it
        assert!(matches!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await,
            Err(MarketError::NotOwner { holder: None, .. })
        ));

        // User holds it in a non-canonical account
        let side_account = Pubkey::new_unique();
        ledger.add_token_account(side_account, &mint, &user, 1).await;
        assert_eq!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await.unwrap(),
            side_account
        );

        // Marketplace custody keeps the canonical address
        ledger.add_token_account(side_account, &mint, &custodian, 1).await;
        assert_eq!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await.unwrap(),
            canonical
        );

        // Someone else
        ledger.add_token_account(side_account, &mint, &stranger, 1).await;
        assert!(matches!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await,
            Err(MarketError::NotOwner { holder: Some(h), .. }) if h == stranger
        ));

        // Canonical account wins without consulting holders
        ledger.add_token_account(canonical, &mint, &user, 1).await;
        assert_eq!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await.unwrap(),
            canonical
        );
    }

    #[tokio::test]
    async fn test_nft_holder_must_be_initialized_token_account() {
        let (ledger, resolver, _) = setup();
        let user = Pubkey::new_unique();
        let custodian = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let holder = Pubkey::new_unique();
        ledger
            .set_largest_accounts(mint, vec![TokenHolding { address: holder, amount: 1 }])
            .await;

        // Uninitialized account with the user's key in the owner slot
        let mut uninitialized = vec![0u8; TokenAccount::LEN];
        uninitialized[0..32].copy_from_slice(mint.as_ref());
        uninitialized[32..64].copy_from_slice(user.as_ref());
        uninitialized[64] = 1;
        ledger.set_account(holder, spl_token::id(), uninitialized).await;
        assert!(matches!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await,
            Err(MarketError::Ledger(LedgerError::InvalidData { .. }))
        ));

        // Too short to be a token account
        let mut short = vec![0u8; 72];
        short[32..64].copy_from_slice(user.as_ref());
        ledger.set_account(holder, spl_token::id(), short).await;
        assert!(matches!(
            resolver.resolve_nft_source(&user, &mint, &custodian).await,
            Err(MarketError::Ledger(LedgerError::InvalidData { .. }))
        ));
    }
}
