use solana_client::client_error::ClientError;
use std::time::Duration;
use thiserror::Error;

/// Typed errors raised by every RPC-facing call the engine makes
#[derive(Debug, Clone, Error)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport {
        endpoint: String,
        message: String,
    },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout {
        endpoint: String,
        timeout_ms: u64,
    },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// Provider answered with its "too many requests" condition
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded {
        endpoint: String,
    },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound {
        endpoint: String,
    },

    #[error("Transaction expired (endpoint: {endpoint})")]
    TransactionExpired {
        endpoint: String,
    },

    #[error("Insufficient funds: {message} (endpoint: {endpoint})")]
    InsufficientFunds {
        endpoint: String,
        message: String,
    },

    /// Fatal errors that should not be retried
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Substrings that mark a funding shortfall; retrying can never fix these.
pub const INSUFFICIENT_FUNDS_MARKERS: &[&str] = &[
    "insufficient funds",
    "insufficient lamports",
    "insufficientfundsforfee",
    "insufficientfundsforrent",
    "insufficient_funds",
];

/// spl-token and token-2022 program ids, lowercased to match normalized messages
const TOKEN_PROGRAM_IDS: &[&str] = &[
    "tokenkegqfezyinwajbnbgkpfxcwubvf9ss623vq5da",
    "tokenzqdbnblqp5vehdkas6epflc1phnbqcxepxeb",
];

/// TokenError::InsufficientFunds. Code 1 of any other program means something else.
const TOKEN_INSUFFICIENT_FUNDS_CODE: &str = "failed: custom program error: 0x1";

/// HTTP 429 only counts next to a status word; bare digits show up inside base58 ids.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "status 429",
    "status: 429",
    "http 429",
    "error 429",
    "code 429",
];

/// Returns true when an error message reports an unrecoverable funding shortfall
pub fn is_insufficient_funds_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    if INSUFFICIENT_FUNDS_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
    {
        return true;
    }
    TOKEN_PROGRAM_IDS
        .iter()
        .any(|program| token_log_reports_code_one(&lower, program))
}

/// Matches the "Program <id> failed: custom program error: 0x1" simulation log line
fn token_log_reports_code_one(lower: &str, program: &str) -> bool {
    let needle = format!("program {} {}", program, TOKEN_INSUFFICIENT_FUNDS_CODE);
    // 0x1 exactly, not 0x10 / 0x1a
    lower.match_indices(needle.as_str()).any(|(idx, _)| {
        lower[idx + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_hexdigit())
    })
}

/// Returns true when an error message carries a provider rate-limit signal
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

impl RpcManagerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            RpcManagerError::RateLimitExceeded { .. } => true,
            RpcManagerError::BlockhashNotFound { .. } => true,
            RpcManagerError::TransactionExpired { .. } => true,

            RpcManagerError::InsufficientFunds { .. } => false,
            RpcManagerError::Fatal(_) => false,
            RpcManagerError::Internal(_) => false,

            // Retry on server errors (5xx)
            RpcManagerError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// The only condition the dispatcher itself recovers from
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RpcManagerError::RateLimitExceeded { .. })
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, RpcManagerError::InsufficientFunds { .. })
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcManagerError::Transport { endpoint, .. } => Some(endpoint),
            RpcManagerError::Timeout { endpoint, .. } => Some(endpoint),
            RpcManagerError::RpcResponse { endpoint, .. } => Some(endpoint),
            RpcManagerError::RateLimitExceeded { endpoint } => Some(endpoint),
            RpcManagerError::BlockhashNotFound { endpoint } => Some(endpoint),
            RpcManagerError::TransactionExpired { endpoint } => Some(endpoint),
            RpcManagerError::InsufficientFunds { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        Self::from_message(&err.to_string(), endpoint)
    }

    /// Classify a raw provider error message
    pub fn from_message(message: &str, endpoint: &str) -> Self {
        let err_str = message.to_lowercase();
        let endpoint = endpoint.to_string();

        if err_str.contains("blockhash not found") {
            RpcManagerError::BlockhashNotFound { endpoint }
        } else if err_str.contains("transaction expired")
            || err_str.contains("block height exceeded")
        {
            RpcManagerError::TransactionExpired { endpoint }
        } else if is_insufficient_funds_message(&err_str) {
            RpcManagerError::InsufficientFunds {
                endpoint,
                message: message.to_string(),
            }
        } else if is_rate_limit_message(&err_str) {
            RpcManagerError::RateLimitExceeded { endpoint }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            RpcManagerError::Timeout {
                endpoint,
                timeout_ms: 0,
            }
        } else if err_str.contains("connection")
            || err_str.contains("error sending request")
            || err_str.contains("dns")
        {
            RpcManagerError::Transport {
                endpoint,
                message: message.to_string(),
            }
        } else {
            // Extract error code if available
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(|c: char| !c.is_ascii_digit()).parse::<i64>().ok());

            RpcManagerError::RpcResponse {
                endpoint,
                message: message.to_string(),
                code,
            }
        }
    }
}

/// Exponential backoff schedule: `base_delay_ms` doubling per retry, capped at `max_delay_ms`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Calculate delay before retry number `attempt` (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Some(Duration::from_millis(delay_ms))
    }

    /// The delays between attempts, as consumed by `tokio_retry`
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Send + 'static {
        let policy = self.clone();
        (0..self.max_attempts.saturating_sub(1)).filter_map(move |n| policy.calculate_delay(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(RpcManagerError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(RpcManagerError::Timeout {
            endpoint: "test".to_string(),
            timeout_ms: 5000,
        }
        .is_retryable());

        assert!(!RpcManagerError::Fatal("test".to_string()).is_retryable());
        assert!(!RpcManagerError::InsufficientFunds {
            endpoint: "test".to_string(),
            message: "insufficient lamports".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_classify_messages() {
        let ep = "https://rpc.test";
        assert!(RpcManagerError::from_message("HTTP status client error (429 Too Many Requests)", ep)
            .is_rate_limited());
        assert!(matches!(
            RpcManagerError::from_message("Blockhash not found", ep),
            RpcManagerError::BlockhashNotFound { .. }
        ));
        assert!(matches!(
            RpcManagerError::from_message("block height exceeded", ep),
            RpcManagerError::TransactionExpired { .. }
        ));
        assert!(RpcManagerError::from_message(
            "Transfer: insufficient lamports 100, need 2039280",
            ep
        )
        .is_insufficient_funds());
        assert!(is_insufficient_funds_message(
            "Transaction simulation failed: Error processing Instruction 2: custom program error: 0x1; \
             Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA failed: custom program error: 0x1"
        ));
        assert!(!is_insufficient_funds_message(
            "Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA failed: custom program error: 0x10"
        ));
        assert!(matches!(
            RpcManagerError::from_message("operation timed out", ep),
            RpcManagerError::Timeout { .. }
        ));
    }

    #[test]
    fn test_digits_inside_ids_are_not_rate_limits() {
        let ep = "https://rpc.test";
        let err = RpcManagerError::from_message(
            "Transaction simulation failed: custom program error: 0x1771; \
             Program 7xKq429mZpTnV8wd3LfQ invoke [1] failed",
            ep,
        );
        assert!(!err.is_rate_limited());
        assert!(matches!(err, RpcManagerError::RpcResponse { .. }));

        assert!(!is_rate_limit_message("bundle contains an already processed transaction 3Nd429fW"));
        assert!(is_rate_limit_message("HTTP status client error (429 Too Many Requests)"));
        assert!(is_rate_limit_message("server responded with status 429"));
    }

    #[test]
    fn test_code_one_only_means_insufficient_funds_for_token_programs() {
        // Some other program's error 1 is a plain failure
        assert!(!is_insufficient_funds_message("InstructionError(0, Custom(1))"));
        assert!(!is_insufficient_funds_message(
            "Error processing Instruction 0: custom program error: 0x1; \
             Program 9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin failed: custom program error: 0x1"
        ));
        assert!(is_insufficient_funds_message(
            "Program TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb failed: custom program error: 0x1"
        ));
    }

    #[test]
    fn test_error_endpoint() {
        let err = RpcManagerError::Timeout {
            endpoint: "https://test.com".to_string(),
            timeout_ms: 5000,
        };

        assert_eq!(err.endpoint(), Some("https://test.com"));

        let fatal_err = RpcManagerError::Fatal("test".to_string());
        assert_eq!(fatal_err.endpoint(), None);
    }

    #[test]
    fn test_retry_policy_doubles_and_caps() {
        let policy = RetryPolicy::new(6, 1_000, 4_000);
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1_000),
                Duration::from_millis(2_000),
                Duration::from_millis(4_000),
                Duration::from_millis(4_000),
                Duration::from_millis(4_000),
            ]
        );
        assert!(policy.calculate_delay(5).is_none());
    }
}
