//! Single-transaction submit/confirm loop
//!
//! Each attempt:
//! 1. If an earlier attempt produced a signature, ask whether it already landed
//! 2. Fetch a fresh blockhash through the dispatcher
//! 3. Rebuild the transaction with an escalated compute unit limit (same price)
//! 4. Sign, send through the dispatcher
//! 5. Watch the signature until confirmed, failed or timed out
//!
//! Funding shortfalls and malformed input abort immediately. Timeouts and expiry get an
//! extra landed-check before backing off, since the transaction may have gone through.

use solana_sdk::{
    commitment_config::CommitmentConfig,
    signature::{Keypair, Signature},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::compat;
use crate::confirmation::ConfirmationWatcher;
use crate::metrics::metrics;
use crate::observability::TraceContext;
use crate::rpc_manager::{LedgerRpc, RateLimitedDispatcher, RpcManagerError};
use crate::structured_logging::SubmissionLogger;
use crate::tx_builder::errors::SubmitError;
use crate::tx_builder::instructions::escalated_compute_limit;
use crate::tx_builder::request::TransactionRequest;
use crate::types::{ConfirmationMethod, ConfirmationOutcome, SubmissionAttempt, SubmitReceipt};

/// Per-submission knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Total attempts, including the first send
    pub max_retries: u32,
    pub commitment: CommitmentConfig,
    pub priority_fee_micro_lamports: u64,
    /// Limit for the first attempt; later attempts escalate from it
    pub compute_unit_limit: u32,
    pub skip_preflight: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            commitment: CommitmentConfig::confirmed(),
            priority_fee_micro_lamports: 200_000,
            compute_unit_limit: 300_000,
            skip_preflight: false,
        }
    }
}

/// Waits between failed attempts, by failure class.
/// Rate-limit waits come from the active profile instead.
#[derive(Debug, Clone, Copy)]
pub struct SubmitBackoff {
    /// Confirmation timeouts and expired blockhashes
    pub timing: Duration,
    pub blockhash: Duration,
    pub default: Duration,
}

impl Default for SubmitBackoff {
    fn default() -> Self {
        Self {
            timing: Duration::from_millis(500),
            blockhash: Duration::from_secs(1),
            default: Duration::from_secs(2),
        }
    }
}

/// Drives one logical transaction to confirmation with bounded retries
pub struct TransactionSubmitter {
    dispatcher: Arc<RateLimitedDispatcher>,
    rpc: Arc<dyn LedgerRpc>,
    watcher: Arc<ConfirmationWatcher>,
    backoff: SubmitBackoff,
}

/// An attempt failure plus the signature it sent, if it got that far
type AttemptFailure = (Option<Signature>, SubmitError);

impl TransactionSubmitter {
    pub fn new(
        dispatcher: Arc<RateLimitedDispatcher>,
        rpc: Arc<dyn LedgerRpc>,
        watcher: Arc<ConfirmationWatcher>,
    ) -> Self {
        Self {
            dispatcher,
            rpc,
            watcher,
            backoff: SubmitBackoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: SubmitBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn watcher(&self) -> &Arc<ConfirmationWatcher> {
        &self.watcher
    }

    pub async fn submit(
        &self,
        request: &TransactionRequest,
        signers: &[Arc<Keypair>],
        options: &SubmitOptions,
    ) -> Result<SubmitReceipt, SubmitError> {
        let ctx = TraceContext::new("submit");
        self.submit_traced(request, signers, options, &ctx).await
    }

    /// Submit under an existing trace, e.g. as one item of a batch
    #[instrument(skip_all, fields(role = request.role.label(), correlation_id = %ctx.correlation_id()))]
    pub async fn submit_traced(
        &self,
        request: &TransactionRequest,
        signers: &[Arc<Keypair>],
        options: &SubmitOptions,
        ctx: &TraceContext,
    ) -> Result<SubmitReceipt, SubmitError> {
        let logger = SubmissionLogger::new(ctx, request.role.label());
        metrics().submissions_started.inc();
        let started = Instant::now();

        let outcome = self.run(request, signers, options, &logger).await;

        match &outcome {
            Ok(receipt) => {
                metrics().submissions_landed.inc();
                logger.log_landed(
                    &receipt.signature,
                    receipt.attempts,
                    receipt.method,
                    started.elapsed().as_millis() as u64,
                );
            }
            Err(_) => metrics().submissions_failed.inc(),
        }
        outcome
    }

    async fn run(
        &self,
        request: &TransactionRequest,
        signers: &[Arc<Keypair>],
        options: &SubmitOptions,
        logger: &SubmissionLogger,
    ) -> Result<SubmitReceipt, SubmitError> {
        if let Err(e) = request.validate(signers) {
            logger.log_fatal(0, &e.to_string());
            return Err(e);
        }

        let max_attempts = options.max_retries.max(1);
        // Every signature any attempt may have put on the wire
        let mut sent: Vec<Signature> = Vec::new();
        let mut last_error: Option<SubmitError> = None;

        for attempt in 0..max_attempts {
            let number = attempt + 1;

            if let Some(signature) = self.first_landed(&sent, options.commitment).await {
                logger.log_already_landed(&signature, number);
                return Ok(SubmitReceipt {
                    signature,
                    attempts: attempt,
                    method: ConfirmationMethod::PollFallback,
                });
            }

            let err = match self.attempt(request, signers, options, attempt, logger).await {
                Ok((signature, method)) => {
                    return Ok(SubmitReceipt {
                        signature,
                        attempts: number,
                        method,
                    })
                }
                Err((signature, err)) => {
                    sent.extend(signature);
                    err
                }
            };

            if err.is_fatal() {
                logger.log_fatal(number, &err.to_string());
                return Err(err);
            }

            // It may have landed despite the local timeout
            if err.is_indeterminate() {
                if let Some(signature) = self.first_landed(&sent, options.commitment).await {
                    logger.log_already_landed(&signature, number);
                    return Ok(SubmitReceipt {
                        signature,
                        attempts: number,
                        method: ConfirmationMethod::PollFallback,
                    });
                }
            }

            if number < max_attempts {
                let wait = self.backoff_for(&err);
                logger.log_retry(number, &err.to_string(), wait.as_millis() as u64);
                metrics().submission_retries.inc();
                tokio::time::sleep(wait).await;
            }
            last_error = Some(err);
        }

        let last_cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        logger.log_exhausted(max_attempts, &last_cause);
        Err(SubmitError::RetriesExhausted {
            attempts: max_attempts,
            last_cause,
        })
    }

    async fn attempt(
        &self,
        request: &TransactionRequest,
        signers: &[Arc<Keypair>],
        options: &SubmitOptions,
        attempt: u32,
        logger: &SubmissionLogger,
    ) -> Result<(Signature, ConfirmationMethod), AttemptFailure> {
        let (blockhash, last_valid_height) = self
            .dispatcher
            .call("getLatestBlockhash", || self.rpc.latest_blockhash(options.commitment))
            .await
            .map_err(|e| (None, SubmitError::from(e)))?;

        let mut state = SubmissionAttempt {
            attempt_number: attempt + 1,
            blockhash,
            last_valid_height,
            signature: None,
            compute_unit_limit: escalated_compute_limit(options.compute_unit_limit, attempt),
            priority_fee_micro_lamports: options.priority_fee_micro_lamports,
        };
        logger.log_attempt(&state);

        let tx = request
            .build(
                signers,
                state.blockhash,
                state.compute_unit_limit,
                state.priority_fee_micro_lamports,
            )
            .map_err(|e| (None, e))?;
        let local_signature = compat::first_signature(&tx);

        let signature = self
            .dispatcher
            .call("sendTransaction", || {
                self.rpc
                    .send_transaction(&tx, options.skip_preflight, options.commitment)
            })
            .await
            .map_err(|e| (local_signature, SubmitError::from(e)))?;
        state.signature = Some(signature);
        logger.log_sent(state.attempt_number, &signature);

        let result = self.watcher.confirm(&signature, options.commitment).await;
        match result.outcome {
            ConfirmationOutcome::Confirmed => Ok((signature, result.method)),
            ConfirmationOutcome::Failed => Err((
                Some(signature),
                SubmitError::on_chain(signature, result.error.unwrap_or_default()),
            )),
            ConfirmationOutcome::TimedOut => Err((
                Some(signature),
                SubmitError::ConfirmationTimeout {
                    signature: signature.to_string(),
                    detail: result.error,
                },
            )),
        }
    }

    /// First of `signatures`, in send order, that already landed
    async fn first_landed(&self, signatures: &[Signature], commitment: CommitmentConfig) -> Option<Signature> {
        for signature in signatures {
            if self.already_landed(signature, commitment).await {
                return Some(*signature);
            }
        }
        None
    }

    /// True when `signature` already reached `commitment` without error.
    /// Lookup failures count as not landed.
    pub async fn already_landed(&self, signature: &Signature, commitment: CommitmentConfig) -> bool {
        match self.watcher.check_status(signature).await {
            Ok(Some(status)) => {
                let landed = status.err.is_none() && status.satisfies(commitment);
                if landed {
                    metrics().idempotent_short_circuits.inc();
                }
                landed
            }
            Ok(None) => false,
            Err(e) => {
                debug!(signature = %signature, error = %e, "Landed check failed");
                false
            }
        }
    }

    fn backoff_for(&self, err: &SubmitError) -> Duration {
        match err {
            e if e.is_indeterminate() => self.backoff.timing,
            SubmitError::Rpc(RpcManagerError::RateLimitExceeded { .. }) => {
                self.dispatcher.profile().retry_backoff()
            }
            SubmitError::Rpc(RpcManagerError::BlockhashNotFound { .. }) => self.backoff.blockhash,
            _ => self.backoff.default,
        }
    }
}
