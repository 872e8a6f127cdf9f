//! Chunked parallel execution of independent submissions
//!
//! Items run in ordered chunks. Inside a chunk every item is submitted concurrently and
//! fails on its own; between chunks a fixed delay keeps bursts away from the provider.

use futures::future::join_all;
use solana_sdk::{commitment_config::CommitmentConfig, signature::{Keypair, Signature}};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::observability::TraceContext;
use crate::tx_builder::request::TransactionRequest;
use crate::tx_builder::submitter::{SubmitOptions, TransactionSubmitter};
use crate::types::{BatchReport, BatchResult, SignatureConfirmation};

/// One independent unit of a batch
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Caller's identifier (wallet id, request id), echoed in the result
    pub id: String,
    pub request: TransactionRequest,
    pub signers: Vec<Arc<Keypair>>,
    /// Falls back to the executor's defaults when unset
    pub options: Option<SubmitOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub chunk_size: usize,
    pub inter_chunk_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 4,
            inter_chunk_delay: Duration::from_millis(1_000),
        }
    }
}

pub struct ParallelBatchExecutor {
    submitter: Arc<TransactionSubmitter>,
    policy: BatchPolicy,
    default_options: SubmitOptions,
}

impl ParallelBatchExecutor {
    pub fn new(submitter: Arc<TransactionSubmitter>, policy: BatchPolicy, default_options: SubmitOptions) -> Self {
        Self {
            submitter,
            policy,
            default_options,
        }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Submit every item, `chunk_size` at a time; results follow input order
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn execute(&self, items: &[BatchItem], chunk_size: Option<usize>) -> BatchReport {
        let size = chunk_size.unwrap_or(self.policy.chunk_size).max(1);
        let ctx = TraceContext::new("batch");
        let mut report = BatchReport {
            results: Vec::with_capacity(items.len()),
            chunks: 0,
        };

        for (index, chunk) in items.chunks(size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.policy.inter_chunk_delay).await;
            }

            let outcomes = join_all(chunk.iter().map(|item| {
                let span = ctx.child_span(&item.id);
                async move {
                    let options = item.options.unwrap_or(self.default_options);
                    let outcome = self
                        .submitter
                        .submit_traced(&item.request, &item.signers, &options, &span)
                        .await;
                    match outcome {
                        Ok(receipt) => BatchResult {
                            id: item.id.clone(),
                            success: true,
                            signature: Some(receipt.signature.to_string()),
                            error: None,
                        },
                        Err(e) => BatchResult {
                            id: item.id.clone(),
                            success: false,
                            signature: None,
                            error: Some(e.to_string()),
                        },
                    }
                }
            }))
            .await;

            report.results.extend(outcomes);
            report.chunks += 1;
        }

        info!(
            correlation_id = %ctx.correlation_id(),
            chunks = report.chunks,
            successes = report.successes(),
            failures = report.failures(),
            "Batch finished"
        );
        report
    }

    /// Confirm signatures independently, chunked like [`execute`](Self::execute)
    pub async fn confirm_many(
        &self,
        signatures: &[Signature],
        commitment: CommitmentConfig,
    ) -> Vec<SignatureConfirmation> {
        let watcher = self.submitter.watcher();
        let mut confirmations = Vec::with_capacity(signatures.len());

        for (index, chunk) in signatures.chunks(self.policy.chunk_size.max(1)).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.policy.inter_chunk_delay).await;
            }
            let results = join_all(chunk.iter().map(|signature| async move {
                let result = watcher.confirm(signature, commitment).await;
                SignatureConfirmation {
                    signature: signature.to_string(),
                    confirmed: result.is_confirmed(),
                }
            }))
            .await;
            confirmations.extend(results);
        }
        confirmations
    }
}
