//! User records and escrow deposits/withdrawals

use solana_sdk::pubkey::Pubkey;
use tracing::instrument;

use crate::ledger::LedgerClient;
use crate::market::client::{Bootstrap, MarketClient};
use crate::market::errors::{non_negative, MarketError};
use crate::market::instructions::{self, EscrowAccounts, MarketOperation};
use crate::market::output::InstructionBundle;
use crate::resolver::associated_account;

impl<L: LedgerClient> MarketClient<L> {
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn init_user_pool(&self, owner: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::InitUserPool, owner);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let user = self.addresses().user_data(owner)?;
            let ix = instructions::init_user_pool(&self.program_id(), *owner, user.address, user.bump);
            Ok(InstructionBundle::new(MarketOperation::InitUserPool, *owner, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Move SOL and/or tokens into the escrow vault
    ///
    /// The owner's currency account is created only for SOL-only deposits; a
    /// token deposit without one fails with `MissingTokenAccount`.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn deposit_to_escrow(
        &self,
        owner: &Pubkey,
        sol: i64,
        token: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::DepositToEscrow, owner);
        let result = self.build_deposit(owner, sol, token).await;
        self.complete(ctx, result)
    }

    async fn build_deposit(
        &self,
        owner: &Pubkey,
        sol: i64,
        token: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let sol = non_negative("sol", sol)?;
        let token = non_negative("token", token)?;
        let user = self.addresses().user_data(owner)?;
        let escrow = self.escrow()?;
        let token_mint = self.token_mint();

        let (owner_currency, escrow_token) = tokio::try_join!(
            self.resolver.resolve_currency(owner, owner, token > 0),
            self.resolver.resolve_ata(owner, &escrow.address, &token_mint),
        )?;

        let mut bootstrap = Bootstrap::new();
        let accounts = EscrowAccounts {
            owner: *owner,
            user: user.address,
            escrow: escrow.address,
            owner_token: bootstrap.take(owner_currency),
            escrow_token: bootstrap.take(escrow_token),
        };
        let ix = instructions::deposit_to_escrow(
            &self.program_id(),
            &accounts,
            user.bump,
            escrow.bump,
            sol,
            token,
        );
        Ok(InstructionBundle::new(
            MarketOperation::DepositToEscrow,
            *owner,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    /// Move SOL and/or tokens out of the escrow vault
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn withdraw_from_escrow(
        &self,
        owner: &Pubkey,
        sol: i64,
        token: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::WithdrawFromEscrow, owner);
        let result = self.build_withdraw(owner, sol, token).await;
        self.complete(ctx, result)
    }

    async fn build_withdraw(
        &self,
        owner: &Pubkey,
        sol: i64,
        token: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let sol = non_negative("sol", sol)?;
        let token = non_negative("token", token)?;
        let user = self.addresses().user_data(owner)?;
        let escrow = self.escrow()?;

        // The owner is receiving, so a missing account is always created
        let owner_currency = self.resolver.resolve_currency(owner, owner, false).await?;

        let mut bootstrap = Bootstrap::new();
        let accounts = EscrowAccounts {
            owner: *owner,
            user: user.address,
            escrow: escrow.address,
            owner_token: bootstrap.take(owner_currency),
            escrow_token: associated_account(&escrow.address, &self.token_mint()),
        };
        let ix = instructions::withdraw_from_escrow(
            &self.program_id(),
            &accounts,
            user.bump,
            escrow.bump,
            sol,
            token,
        );
        Ok(InstructionBundle::new(
            MarketOperation::WithdrawFromEscrow,
            *owner,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }
}
