//! RPC Manager Module
//!
//! Provider profiles, typed RPC errors, and the rate-limited dispatcher that every
//! outbound ledger call goes through.

// Submodules
pub mod rpc_atomics;
pub mod rpc_client;
pub mod rpc_config;
pub mod rpc_dispatcher;
pub mod rpc_errors;

// Re-exports for convenience
pub use rpc_atomics::DispatchStatsSnapshot;
pub use rpc_client::{LedgerRpc, SignatureStatus, SolanaLedgerRpc};
pub use rpc_config::{ProfileKind, RpcProfile};
pub use rpc_dispatcher::RateLimitedDispatcher;
pub use rpc_errors::{RetryPolicy, RpcManagerError};
