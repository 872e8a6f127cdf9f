//! Execution engine facade
//!
//! Wires one dispatcher, one watcher and the components on top of them from an
//! [`EngineConfig`], and exposes the operations callers use.

use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::confirmation::{ConfirmationWatcher, PubsubSignatureSubscriber, SignatureSubscriber};
use crate::cost_model::{self, AccountType, BalanceCheck, CostBreakdown};
use crate::rpc_manager::{DispatchStatsSnapshot, LedgerRpc, RateLimitedDispatcher, RpcManagerError, SolanaLedgerRpc};
use crate::tx_builder::{
    BatchItem, BundleError, ParallelBatchExecutor, RelayBundleClient, SubmitError, SubmitOptions,
    TransactionRequest, TransactionRole, TransactionSubmitter,
};
use crate::types::{BatchReport, ConfirmationResult, SignatureConfirmation, SubmitReceipt};

/// Everything needed to submit, batch, bundle and confirm against one provider
pub struct ExecutionEngine {
    dispatcher: Arc<RateLimitedDispatcher>,
    rpc: Arc<dyn LedgerRpc>,
    watcher: Arc<ConfirmationWatcher>,
    submitter: Arc<TransactionSubmitter>,
    batch: ParallelBatchExecutor,
    relay: Option<RelayBundleClient>,
    default_options: SubmitOptions,
}

impl ExecutionEngine {
    /// Build the production stack from configuration.
    ///
    /// The relay client is only built when relay endpoints are configured.
    pub fn from_config(config: &EngineConfig) -> Result<Self, BundleError> {
        let profile = config.rpc_profile();
        info!(
            rpc_url = %config.rpc.url,
            profile = ?profile.kind,
            push = profile.use_push_confirmation,
            "Initializing execution engine"
        );

        let rpc: Arc<dyn LedgerRpc> =
            Arc::new(SolanaLedgerRpc::new(config.rpc.url.clone(), config.request_timeout()));
        let subscriber = if profile.use_push_confirmation {
            Some(Arc::new(PubsubSignatureSubscriber::new(config.ws_url())) as Arc<dyn SignatureSubscriber>)
        } else {
            None
        };
        let dispatcher = RateLimitedDispatcher::shared(profile);

        let mut engine = Self::new(dispatcher, rpc, subscriber, config);
        if !config.relay.endpoints.is_empty() {
            engine.relay = Some(RelayBundleClient::new(config.relay.clone(), engine.watcher.clone())?);
        }
        Ok(engine)
    }

    /// Assemble around caller-supplied seams; no relay client is attached
    pub fn new(
        dispatcher: Arc<RateLimitedDispatcher>,
        rpc: Arc<dyn LedgerRpc>,
        subscriber: Option<Arc<dyn SignatureSubscriber>>,
        config: &EngineConfig,
    ) -> Self {
        let watcher = Arc::new(ConfirmationWatcher::new(dispatcher.clone(), rpc.clone(), subscriber));
        let submitter = Arc::new(TransactionSubmitter::new(dispatcher.clone(), rpc.clone(), watcher.clone()));
        let default_options = config.submit_options();
        let batch = ParallelBatchExecutor::new(submitter.clone(), config.batch_policy(), default_options);

        Self {
            dispatcher,
            rpc,
            watcher,
            submitter,
            batch,
            relay: None,
            default_options,
        }
    }

    pub fn with_relay(mut self, relay: RelayBundleClient) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn default_options(&self) -> SubmitOptions {
        self.default_options
    }

    pub fn watcher(&self) -> &Arc<ConfirmationWatcher> {
        &self.watcher
    }

    pub fn dispatcher_stats(&self) -> DispatchStatsSnapshot {
        self.dispatcher.stats()
    }

    /// Sign, send and confirm one request; `None` options use the configured defaults
    pub async fn submit(
        &self,
        request: &TransactionRequest,
        signers: &[Arc<Keypair>],
        options: Option<SubmitOptions>,
    ) -> Result<SubmitReceipt, SubmitError> {
        let options = options.unwrap_or(self.default_options);
        self.submitter.submit(request, signers, &options).await
    }

    /// True only when the signature reached `commitment` without error before `timeout`
    pub async fn confirm(&self, signature: &Signature, commitment: CommitmentConfig, timeout: Duration) -> bool {
        self.watcher
            .confirm_with_timeout(signature, commitment, timeout)
            .await
            .is_confirmed()
    }

    pub async fn execute_batch(&self, items: &[BatchItem], chunk_size: Option<usize>) -> BatchReport {
        self.batch.execute(items, chunk_size).await
    }

    pub async fn confirm_batch(&self, signatures: &[Signature], commitment: CommitmentConfig) -> Vec<SignatureConfirmation> {
        self.batch.confirm_many(signatures, commitment).await
    }

    fn relay(&self) -> Result<&RelayBundleClient, BundleError> {
        self.relay.as_ref().ok_or(BundleError::NoEndpoints)
    }

    pub async fn submit_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String, BundleError> {
        self.relay()?.submit_bundle(transactions).await
    }

    /// Bundles land atomically, so the first signature speaks for the whole group
    pub async fn confirm_bundle(&self, first_signature: &Signature, commitment: CommitmentConfig) -> ConfirmationResult {
        self.watcher.confirm(first_signature, commitment).await
    }

    pub async fn submit_and_confirm_bundle(
        &self,
        transactions: &[VersionedTransaction],
        commitment: CommitmentConfig,
    ) -> Result<(String, ConfirmationResult), BundleError> {
        self.relay()?
            .submit_and_confirm_bundle(transactions, commitment)
            .await
    }

    pub fn estimate_cost(
        &self,
        priority_fee_micro_lamports: u64,
        compute_unit_limit: u32,
        account_types: &[AccountType],
    ) -> CostBreakdown {
        cost_model::total_cost(priority_fee_micro_lamports, compute_unit_limit, account_types, true)
    }

    /// Cost of a request of `role` under `options`
    pub fn estimate_cost_for(&self, role: &TransactionRole, options: &SubmitOptions) -> CostBreakdown {
        self.estimate_cost(
            options.priority_fee_micro_lamports,
            options.compute_unit_limit,
            &role.created_accounts(),
        )
    }

    pub fn validate_balance(&self, balance: u64, cost: &CostBreakdown, extra_spend: u64) -> BalanceCheck {
        cost_model::validate_balance(balance, cost, extra_spend)
    }

    /// Fetch the payer's balance and check it covers a `role` transaction plus `extra_spend`
    #[instrument(skip(self, options), fields(role = role.label()))]
    pub async fn check_funding(
        &self,
        payer: &Pubkey,
        options: &SubmitOptions,
        role: &TransactionRole,
        extra_spend: u64,
    ) -> Result<BalanceCheck, RpcManagerError> {
        let balance = self
            .dispatcher
            .call("get_balance", || {
                let rpc = self.rpc.clone();
                let payer = *payer;
                async move { rpc.balance(&payer).await }
            })
            .await?;

        let cost = self.estimate_cost_for(role, options);
        let check = self.validate_balance(balance, &cost, extra_spend);
        info!(
            payer = %payer,
            balance,
            required = cost.total_lamports.saturating_add(extra_spend),
            shortfall = check.shortfall,
            "Funding check"
        );
        Ok(check)
    }
}
