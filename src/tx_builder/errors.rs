//! Error types for submission, batching and relay bundles
//!
//! Errors split into three groups:
//! - Fatal: retrying can never help (funding shortfall, malformed input, protocol violations)
//! - Retryable: rate limits, expired blockhashes, confirmation timeouts, network faults
//! - Terminal: a retry loop ran out of attempts; carries the last underlying cause

use thiserror::Error;

use crate::rpc_manager::RpcManagerError;

/// Errors raised while driving one logical transaction to confirmation
#[derive(Error, Debug, Clone)]
pub enum SubmitError {
    /// The payer cannot cover fees, rent or the transfer itself
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// A key the message requires has no keypair among the supplied signers
    #[error("Missing required signer: {pubkey}")]
    MissingSigner { pubkey: String },

    /// The request itself is malformed (no instructions, message compile failure)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    /// Underlying RPC failure, classified by the dispatcher layer
    #[error(transparent)]
    Rpc(#[from] RpcManagerError),

    /// No confirmation within the watcher's timeout; the transaction may still land
    #[error("Confirmation timed out for {signature}")]
    ConfirmationTimeout {
        signature: String,
        detail: Option<String>,
    },

    /// The transaction executed and failed on-chain
    #[error("Transaction {signature} failed on-chain: {reason}")]
    OnChainFailure { signature: String, reason: String },

    /// Every attempt failed
    #[error("Gave up after {attempts} attempts, last error: {last_cause}")]
    RetriesExhausted { attempts: u32, last_cause: String },
}

impl SubmitError {
    /// Errors that abort the retry loop immediately
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InsufficientFunds(_) => true,
            Self::MissingSigner { .. } => true,
            Self::InvalidRequest(_) => true,
            Self::Signing(_) => true,
            Self::RetriesExhausted { .. } => true,
            Self::Rpc(e) => e.is_insufficient_funds() || matches!(e, RpcManagerError::Fatal(_)),
            Self::ConfirmationTimeout { .. } => false,
            Self::OnChainFailure { .. } => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }

    /// Timeouts and expiry: the previous attempt may have landed after all
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Self::ConfirmationTimeout { .. }
                | Self::Rpc(RpcManagerError::TransactionExpired { .. })
                | Self::Rpc(RpcManagerError::Timeout { .. })
        )
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InsufficientFunds(_) => "funds",
            Self::MissingSigner { .. } => "signer",
            Self::InvalidRequest(_) => "input",
            Self::Signing(_) => "signing",
            Self::Rpc(RpcManagerError::RateLimitExceeded { .. }) => "rate_limit",
            Self::Rpc(RpcManagerError::BlockhashNotFound { .. }) => "blockhash",
            Self::Rpc(RpcManagerError::TransactionExpired { .. }) => "expired",
            Self::Rpc(RpcManagerError::InsufficientFunds { .. }) => "funds",
            Self::Rpc(RpcManagerError::Timeout { .. }) => "timeout",
            Self::Rpc(_) => "rpc",
            Self::ConfirmationTimeout { .. } => "timeout",
            Self::OnChainFailure { .. } => "onchain",
            Self::RetriesExhausted { .. } => "exhausted",
        }
    }
}

// Convenience constructors
impl SubmitError {
    pub fn missing_signer(pubkey: impl ToString) -> Self {
        Self::MissingSigner {
            pubkey: pubkey.to_string(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// A landed transaction's on-chain error. Funding errors become fatal.
    pub fn on_chain(signature: impl ToString, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if crate::rpc_manager::rpc_errors::is_insufficient_funds_message(&reason) {
            Self::InsufficientFunds(reason)
        } else {
            Self::OnChainFailure {
                signature: signature.to_string(),
                reason,
            }
        }
    }
}

/// Errors raised by the relay bundle client
#[derive(Error, Debug, Clone)]
pub enum BundleError {
    /// Empty bundle, too many transactions, unsigned transactions
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("No relay endpoints configured")]
    NoEndpoints,

    #[error("Failed to encode bundle: {0}")]
    Encoding(String),

    /// A success response without a bundle id
    #[error("Relay protocol violation at {endpoint}: {message}")]
    ProtocolViolation { endpoint: String, message: String },

    /// The relay answered with a JSON-RPC error that is not a rate limit
    #[error("Relay rejected bundle at {endpoint}: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("Relay rate limited (endpoint: {endpoint})")]
    RateLimited { endpoint: String },

    #[error("Every relay endpoint rate limited after {rotations} rotations")]
    RotationsExhausted { rotations: u32 },

    #[error("Relay transport error at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Relay HTTP {status} at {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Bundle confirmation: {0}")]
    Confirmation(String),
}

impl BundleError {
    /// Transport-level failures retried on the same endpoint
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_fatal(&self) -> bool {
        !self.is_transient() && !self.is_rate_limited()
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidBundle(_) => "input",
            Self::NoEndpoints => "config",
            Self::Encoding(_) => "encoding",
            Self::ProtocolViolation { .. } => "protocol",
            Self::Rejected { .. } => "rejected",
            Self::RateLimited { .. } => "rate_limit",
            Self::RotationsExhausted { .. } => "rate_limit",
            Self::Transport { .. } => "transport",
            Self::Http { .. } => "http",
            Self::Confirmation(_) => "confirmation",
        }
    }
}
