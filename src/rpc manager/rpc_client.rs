//! The ledger RPC seam used by every engine component
//!
//! [`LedgerRpc`] is the narrow set of calls the engine needs; [`SolanaLedgerRpc`] backs it
//! with the nonblocking solana-client `RpcClient`. Calls made through this trait are raw;
//! throttling is the caller's job via the dispatcher.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use std::sync::Arc;
use std::time::Duration;

use super::rpc_errors::RpcManagerError;

/// Where a signature currently stands on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub level: CommitmentLevel,
    /// Decoded on-chain failure, if the transaction executed with an error
    pub err: Option<String>,
}

fn commitment_rank(level: CommitmentLevel) -> u8 {
    match level {
        CommitmentLevel::Processed => 0,
        CommitmentLevel::Confirmed => 1,
        CommitmentLevel::Finalized => 2,
    }
}

impl SignatureStatus {
    /// True once the status has reached at least `commitment`
    pub fn satisfies(&self, commitment: CommitmentConfig) -> bool {
        commitment_rank(self.level) >= commitment_rank(commitment.commitment)
    }

    pub fn from_transaction_status(status: &TransactionStatus) -> Self {
        let level = match status.confirmation_status() {
            TransactionConfirmationStatus::Processed => CommitmentLevel::Processed,
            TransactionConfirmationStatus::Confirmed => CommitmentLevel::Confirmed,
            TransactionConfirmationStatus::Finalized => CommitmentLevel::Finalized,
        };
        Self {
            slot: status.slot,
            level,
            err: status.err.as_ref().map(|e| format!("{:?}", e)),
        }
    }
}

/// Calls the engine makes against the ledger's RPC interface
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Endpoint label used in errors and logs
    fn endpoint(&self) -> &str;

    /// Fresh blockhash and the last block height at which it is valid
    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), RpcManagerError>;

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
        commitment: CommitmentConfig,
    ) -> Result<Signature, RpcManagerError>;

    /// `None` when the ledger has no record of the signature (yet)
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError>;

    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, RpcManagerError>;
}

/// [`LedgerRpc`] over the solana-client nonblocking RPC client
pub struct SolanaLedgerRpc {
    client: Arc<RpcClient>,
    url: String,
}

impl std::fmt::Debug for SolanaLedgerRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedgerRpc")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl SolanaLedgerRpc {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        let url = url.into();
        Self {
            client: Arc::new(RpcClient::new_with_timeout(url.clone(), request_timeout)),
            url,
        }
    }

    pub fn client(&self) -> Arc<RpcClient> {
        self.client.clone()
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedgerRpc {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), RpcManagerError> {
        self.client
            .get_latest_blockhash_with_commitment(commitment)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
        commitment: CommitmentConfig,
    ) -> Result<Signature, RpcManagerError> {
        // max_retries = 0: the submitter owns retries and must see every resend
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(commitment.commitment),
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        self.client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url))?;

        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus::from_transaction_status(&status)))
    }

    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, RpcManagerError> {
        self.client
            .get_balance(pubkey)
            .await
            .map_err(|e| RpcManagerError::from_client_error(e, &self.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_commitment_ordering() {
        let status = SignatureStatus {
            slot: 10,
            level: CommitmentLevel::Confirmed,
            err: None,
        };
        assert!(status.satisfies(CommitmentConfig::processed()));
        assert!(status.satisfies(CommitmentConfig::confirmed()));
        assert!(!status.satisfies(CommitmentConfig::finalized()));
    }
}
