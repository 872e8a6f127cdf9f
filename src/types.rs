//! Shared value types passed between the engine's components

use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, signature::Signature};

/// How a confirmation watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// Reached the requested commitment with no on-chain error
    Confirmed,
    /// Executed with an on-chain error
    Failed,
    /// No answer within the timeout. The transaction may still have landed.
    TimedOut,
}

impl ConfirmationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationOutcome::Confirmed => "confirmed",
            ConfirmationOutcome::Failed => "failed",
            ConfirmationOutcome::TimedOut => "timed_out",
        }
    }
}

/// Which path produced a confirmation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationMethod {
    #[serde(rename = "push")]
    Push,
    #[serde(rename = "poll-fallback")]
    PollFallback,
}

impl ConfirmationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationMethod::Push => "push",
            ConfirmationMethod::PollFallback => "poll-fallback",
        }
    }
}

impl std::fmt::Display for ConfirmationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value of one confirmation watch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    pub outcome: ConfirmationOutcome,
    pub method: ConfirmationMethod,
    pub error: Option<String>,
}

impl ConfirmationResult {
    pub fn confirmed(method: ConfirmationMethod) -> Self {
        Self {
            outcome: ConfirmationOutcome::Confirmed,
            method,
            error: None,
        }
    }

    pub fn failed(method: ConfirmationMethod, error: impl Into<String>) -> Self {
        Self {
            outcome: ConfirmationOutcome::Failed,
            method,
            error: Some(error.into()),
        }
    }

    pub fn timed_out(method: ConfirmationMethod, detail: Option<String>) -> Self {
        Self {
            outcome: ConfirmationOutcome::TimedOut,
            method,
            error: detail,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.outcome == ConfirmationOutcome::Confirmed
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == ConfirmationOutcome::Failed
    }

    pub fn is_timed_out(&self) -> bool {
        self.outcome == ConfirmationOutcome::TimedOut
    }
}

/// One attempt of a logical submission. Built fresh for every retry.
#[derive(Debug, Clone)]
pub struct SubmissionAttempt {
    pub attempt_number: u32,
    pub blockhash: Hash,
    pub last_valid_height: u64,
    pub signature: Option<Signature>,
    pub compute_unit_limit: u32,
    pub priority_fee_micro_lamports: u64,
}

/// Successful outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub signature: Signature,
    /// Attempt (1-based) on which the signature was found confirmed
    pub attempts: u32,
    pub method: ConfirmationMethod,
}

/// Outcome of one batch item, reported in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub id: String,
    pub success: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
}

/// All outcomes of a batch plus how it was chunked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<BatchResult>,
    pub chunks: usize,
}

impl BatchReport {
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failures(&self) -> usize {
        self.results.len() - self.successes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureConfirmation {
    pub signature: String,
    pub confirmed: bool,
}
