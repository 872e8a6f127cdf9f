//! Structured lifecycle logging for submissions
//!
//! Every event carries the correlation id and the operation (the batch item id for
//! batched submissions), so one grep reconstructs a submission's attempts.

use solana_sdk::signature::Signature;

use crate::observability::TraceContext;
use crate::types::{ConfirmationMethod, SubmissionAttempt};

/// Emits the lifecycle events of one logical transaction or bundle
#[derive(Debug, Clone)]
pub struct SubmissionLogger {
    correlation_id: String,
    operation: String,
    span_id: String,
    role: &'static str,
}

impl SubmissionLogger {
    pub fn new(ctx: &TraceContext, role: &'static str) -> Self {
        Self {
            correlation_id: ctx.correlation_id().to_string(),
            operation: ctx.operation().to_string(),
            span_id: ctx.span_id().to_string(),
            role,
        }
    }

    pub fn log_attempt(&self, attempt: &SubmissionAttempt) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            attempt = attempt.attempt_number,
            blockhash = %attempt.blockhash,
            last_valid_height = attempt.last_valid_height,
            compute_unit_limit = attempt.compute_unit_limit,
            priority_fee = attempt.priority_fee_micro_lamports,
            "Submitting attempt"
        );
    }

    pub fn log_sent(&self, attempt: u32, signature: &Signature) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            attempt = attempt,
            signature = %signature,
            "Transaction sent"
        );
    }

    pub fn log_landed(&self, signature: &Signature, attempts: u32, method: ConfirmationMethod, latency_ms: u64) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            signature = %signature,
            attempts = attempts,
            method = %method,
            latency_ms = latency_ms,
            "Transaction confirmed"
        );
    }

    pub fn log_already_landed(&self, signature: &Signature, attempt: u32) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            signature = %signature,
            attempt = attempt,
            "Previous attempt already confirmed, not resending"
        );
    }

    pub fn log_retry(&self, attempt: u32, error: &str, backoff_ms: u64) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            attempt = attempt,
            error = %error,
            backoff_ms = backoff_ms,
            "Attempt failed, retrying"
        );
    }

    pub fn log_fatal(&self, attempt: u32, error: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            attempt = attempt,
            error = %error,
            "Non-retryable failure"
        );
    }

    pub fn log_exhausted(&self, attempts: u32, error: &str) {
        tracing::error!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            span_id = %self.span_id,
            role = self.role,
            attempts = attempts,
            error = %error,
            "Retries exhausted"
        );
    }
}
