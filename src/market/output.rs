//! Assembled instruction bundle
//!
//! The result of every marketplace operation. Holds the ordered instruction
//! list (token account creations first, the program instruction last) and
//! the trailing treasury accounts, ready to be signed and submitted by the
//! caller.
//!
//! ## Key Features
//! - Bootstrap / operation split without re-deriving anything
//! - Unsigned `Message` with the payer as fee payer
//! - Required signers extracted from the message header
//! - Serializable summary (base58 addresses and data) for dry runs

use serde::Serialize;
use solana_sdk::{instruction::Instruction, message::Message, pubkey::Pubkey};

use crate::market::instructions::MarketOperation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionBundle {
    pub operation: MarketOperation,

    /// Fee payer and funder of any account creation
    pub payer: Pubkey,

    /// Bootstrap instructions followed by the program instruction
    pub instructions: Vec<Instruction>,

    /// Treasury accounts appended after the program instruction's fixed accounts
    pub remaining_accounts: Vec<Pubkey>,
}

impl InstructionBundle {
    pub fn new(
        operation: MarketOperation,
        payer: Pubkey,
        bootstrap: Vec<Instruction>,
        operation_ix: Instruction,
        remaining_accounts: Vec<Pubkey>,
    ) -> Self {
        let mut instructions = bootstrap;
        instructions.push(operation_ix);
        Self {
            operation,
            payer,
            instructions,
            remaining_accounts,
        }
    }

    /// Token account creations preceding the program instruction
    pub fn bootstrap(&self) -> &[Instruction] {
        self.instructions
            .split_last()
            .map(|(_, rest)| rest)
            .unwrap_or(&[])
    }

    pub fn bootstrap_count(&self) -> usize {
        self.bootstrap().len()
    }

    /// The marketplace program instruction
    pub fn operation_instruction(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Unsigned legacy message paid by `payer`
    pub fn message(&self) -> Message {
        Message::new(&self.instructions, Some(&self.payer))
    }

    /// Signers required by the message, fee payer first
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let message = self.message();
        let count = message.header.num_required_signatures as usize;
        message.account_keys.iter().take(count).copied().collect()
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            operation: self.operation,
            payer: self.payer.to_string(),
            bootstrap_count: self.bootstrap_count(),
            required_signers: self
                .required_signers()
                .iter()
                .map(ToString::to_string)
                .collect(),
            remaining_accounts: self
                .remaining_accounts
                .iter()
                .map(ToString::to_string)
                .collect(),
            instructions: self.instructions.iter().map(InstructionSummary::from).collect(),
        }
    }
}

/// Serializable view of a bundle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub operation: MarketOperation,
    pub payer: String,
    pub bootstrap_count: usize,
    pub required_signers: Vec<String>,
    pub remaining_accounts: Vec<String>,
    pub instructions: Vec<InstructionSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionSummary {
    pub program_id: String,
    pub accounts: Vec<AccountSummary>,
    /// Instruction data, base58
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl From<&Instruction> for InstructionSummary {
    fn from(ix: &Instruction) -> Self {
        Self {
            program_id: ix.program_id.to_string(),
            accounts: ix
                .accounts
                .iter()
                .map(|meta| AccountSummary {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: bs58::encode(&ix.data).into_string(),
        }
    }
}
