//! Marketplace administration: global record setup, fees, treasuries

use solana_sdk::pubkey::Pubkey;
use tracing::instrument;

use crate::ledger::LedgerClient;
use crate::market::client::{Bootstrap, MarketClient};
use crate::market::errors::{non_negative, MarketError};
use crate::market::instructions::{self, MarketOperation};
use crate::market::output::InstructionBundle;

impl<L: LedgerClient> MarketClient<L> {
    /// Create the global and escrow records
    #[instrument(skip(self), fields(admin = %admin))]
    pub async fn initialize(&self, admin: &Pubkey) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::Initialize, admin);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let global = self.global()?;
            let escrow = self.escrow()?;
            let ix = instructions::initialize(
                &self.program_id(),
                *admin,
                global.address,
                escrow.address,
                global.bump,
                escrow.bump,
            );
            Ok(InstructionBundle::new(MarketOperation::Initialize, *admin, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Set the SOL and token fees (permyriad)
    #[instrument(skip(self), fields(admin = %admin))]
    pub async fn update_fee(
        &self,
        admin: &Pubkey,
        sol_fee: i64,
        token_fee: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::UpdateFee, admin);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let sol_fee = non_negative("sol_fee", sol_fee)?;
            let token_fee = non_negative("token_fee", token_fee)?;
            let global = self.global()?;
            let ix = instructions::update_fee(
                &self.program_id(),
                *admin,
                global.address,
                global.bump,
                sol_fee,
                token_fee,
            );
            Ok(InstructionBundle::new(MarketOperation::UpdateFee, *admin, vec![], ix, vec![]))
        })();
        self.complete(ctx, result)
    }

    /// Register a treasury wallet, creating its token account if needed
    #[instrument(skip(self), fields(admin = %admin, treasury = %treasury))]
    pub async fn add_team_treasury(
        &self,
        admin: &Pubkey,
        treasury: &Pubkey,
        rate: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::AddTeamTreasury, admin);
        let result = self.build_add_team_treasury(admin, treasury, rate).await;
        self.complete(ctx, result)
    }

    async fn build_add_team_treasury(
        &self,
        admin: &Pubkey,
        treasury: &Pubkey,
        rate: i64,
    ) -> Result<InstructionBundle, MarketError> {
        let rate = non_negative("rate", rate)?;
        let global = self.global()?;

        let mut bootstrap = Bootstrap::new();
        bootstrap.take(
            self.resolver
                .resolve_ata(admin, treasury, &self.token_mint())
                .await?,
        );

        let ix = instructions::add_team_treasury(
            &self.program_id(),
            *admin,
            global.address,
            global.bump,
            treasury,
            rate,
        );
        Ok(InstructionBundle::new(
            MarketOperation::AddTeamTreasury,
            *admin,
            bootstrap.into_instructions(),
            ix,
            vec![],
        ))
    }

    #[instrument(skip(self), fields(admin = %admin, treasury = %treasury))]
    pub async fn remove_team_treasury(
        &self,
        admin: &Pubkey,
        treasury: &Pubkey,
    ) -> Result<InstructionBundle, MarketError> {
        let ctx = self.begin(MarketOperation::RemoveTeamTreasury, admin);
        let result = (|| -> Result<InstructionBundle, MarketError> {
            let global = self.global()?;
            let ix = instructions::remove_team_treasury(
                &self.program_id(),
                *admin,
                global.address,
                global.bump,
                treasury,
            );
            Ok(InstructionBundle::new(
                MarketOperation::RemoveTeamTreasury,
                *admin,
                vec![],
                ix,
                vec![],
            ))
        })();
        self.complete(ctx, result)
    }
}
