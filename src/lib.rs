//! Landing Engine - Solana transaction execution and confirmation
//!
//! Rate-limited RPC dispatch, fee and rent estimation, push-with-poll-fallback
//! confirmation, idempotent retrying submission, chunked batches and relay bundles.

pub mod compat;
pub mod config;
pub mod confirmation;
pub mod cost_model;
pub mod engine;
pub mod metrics;
pub mod observability;
pub mod structured_logging;
pub mod tx_builder;
pub mod types;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod test_utils;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use confirmation::{ConfirmationWatcher, SignatureSubscriber, SignatureSubscription};
pub use cost_model::{AccountType, BalanceCheck, CostBreakdown};
pub use engine::ExecutionEngine;
pub use rpc_manager::{LedgerRpc, RateLimitedDispatcher, RpcManagerError, RpcProfile};
pub use tx_builder::{
    BatchItem, BundleError, ParallelBatchExecutor, RelayBundleClient, SubmitError, SubmitOptions,
    TransactionRequest, TransactionRole, TransactionSubmitter,
};
pub use types::{BatchReport, BatchResult, ConfirmationMethod, ConfirmationOutcome, ConfirmationResult, SubmitReceipt};

#[cfg(test)]
mod tests {
    // Scenario test modules
    mod batch_scenarios;
    mod bundle_scenarios;
    mod dispatcher_properties;
    mod submit_scenarios;
    mod test_helpers;
}
