//! Transaction execution: submission, batching and relay bundles
//!
//! ## Architecture
//!
//! - **errors**: `SubmitError` / `BundleError` taxonomy with fatal vs retryable classification
//! - **instructions**: compute budget strip and re-injection, per-attempt limit escalation
//! - **request**: immutable `TransactionRequest` plus explicit `TransactionRole`
//! - **submitter**: `TransactionSubmitter`, the idempotent submit/confirm retry loop
//! - **batch**: `ParallelBatchExecutor`, chunked fan-out over the submitter
//! - **bundle**: `RelayBundleClient`, atomic bundles with endpoint rotation and a global send gate
//!
//! Every RPC call goes through the shared `RateLimitedDispatcher`; every confirmation goes
//! through the `ConfirmationWatcher`.

pub mod batch;
pub mod bundle;
pub mod errors;
pub mod instructions;
pub mod request;
pub mod submitter;

pub use batch::{BatchItem, BatchPolicy, ParallelBatchExecutor};
pub use bundle::{RelayBundleClient, RelayConfig};
pub use errors::{BundleError, SubmitError};
pub use instructions::{escalated_compute_limit, with_compute_budget};
pub use request::{TransactionRequest, TransactionRole};
pub use submitter::{SubmitBackoff, SubmitOptions, TransactionSubmitter};
