//! Immutable transaction requests
//!
//! A [`TransactionRequest`] is the caller's intent: payer, program instructions, lookup
//! tables and an explicit [`TransactionRole`]. It is never mutated. Each submission
//! attempt builds a brand new signed transaction from it with that attempt's blockhash
//! and compute budget.

use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};

use crate::compat;
use crate::cost_model::AccountType;
use crate::tx_builder::errors::SubmitError;
use crate::tx_builder::instructions::{strip_compute_budget, with_compute_budget};

/// What a transaction does, declared by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRole {
    Transfer,
    Trade,
    /// Creates a token mint; the mint keypair must co-sign
    Create { mint: Pubkey },
}

impl TransactionRole {
    /// Signer required on top of the payer
    pub fn required_cosigner(&self) -> Option<Pubkey> {
        match self {
            TransactionRole::Create { mint } => Some(*mint),
            _ => None,
        }
    }

    /// Accounts this role brings into existence, for rent estimation
    pub fn created_accounts(&self) -> Vec<AccountType> {
        match self {
            TransactionRole::Create { .. } => vec![AccountType::Mint, AccountType::Token],
            _ => Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionRole::Transfer => "transfer",
            TransactionRole::Trade => "trade",
            TransactionRole::Create { .. } => "create",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub payer: Pubkey,
    pub instructions: Vec<Instruction>,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    pub role: TransactionRole,
}

impl TransactionRequest {
    pub fn new(payer: Pubkey, instructions: Vec<Instruction>, role: TransactionRole) -> Self {
        Self {
            payer,
            instructions,
            lookup_tables: Vec::new(),
            role,
        }
    }

    pub fn with_lookup_tables(mut self, lookup_tables: Vec<AddressLookupTableAccount>) -> Self {
        self.lookup_tables = lookup_tables;
        self
    }

    /// Reject requests no attempt could ever land, before touching the network
    pub fn validate<K: AsRef<Keypair>>(&self, signers: &[K]) -> Result<(), SubmitError> {
        if strip_compute_budget(&self.instructions).is_empty() {
            return Err(SubmitError::invalid("request has no program instructions"));
        }

        let has_signer = |key: &Pubkey| signers.iter().any(|kp| kp.as_ref().pubkey() == *key);

        if !has_signer(&self.payer) {
            return Err(SubmitError::missing_signer(self.payer));
        }
        if let Some(cosigner) = self.role.required_cosigner() {
            if !has_signer(&cosigner) {
                return Err(SubmitError::missing_signer(cosigner));
            }
        }
        Ok(())
    }

    /// Compile and sign one attempt's transaction
    pub fn build<K: AsRef<Keypair>>(
        &self,
        signers: &[K],
        blockhash: Hash,
        cu_limit: u32,
        priority_fee_micro_lamports: u64,
    ) -> Result<VersionedTransaction, SubmitError> {
        let instructions = with_compute_budget(&self.instructions, cu_limit, priority_fee_micro_lamports);

        let message = v0::Message::try_compile(&self.payer, &instructions, &self.lookup_tables, blockhash)
            .map_err(|e| SubmitError::invalid(format!("failed to compile message: {}", e)))?;

        compat::sign_versioned_message(VersionedMessage::V0(message), signers)
            .map_err(SubmitError::missing_signer)
    }
}
