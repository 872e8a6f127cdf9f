//! Atomic bundle submission to a relay network
//!
//! - One global send gate spaces every bundle POST by `min_send_interval_ms`, whichever
//!   caller issues it
//! - A rate-limit answer rotates to the next endpoint (wrapping) after a fixed delay,
//!   up to `max_rotations` times
//! - Transport failures retry on the same endpoint with exponential backoff
//! - A success answer without a bundle id is a protocol violation and is never retried
//!
//! The relay is never polled for bundle status. Inclusion is atomic, so a bundle is
//! confirmed through its first transaction's signature on the ledger.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_sdk::{
    commitment_config::CommitmentConfig, signature::Signature, transaction::VersionedTransaction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, info, instrument, warn};

use crate::compat;
use crate::confirmation::ConfirmationWatcher;
use crate::metrics::metrics;
use crate::observability::TraceContext;
use crate::rpc_manager::rpc_errors::{is_rate_limit_message, RetryPolicy};
use crate::tx_builder::errors::BundleError;
use crate::types::ConfirmationResult;

/// Relay cap on transactions per bundle
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bundle ingestion URLs of one relay network, in priority order
    pub endpoints: Vec<String>,
    /// Floor between any two bundle sends, process-wide
    pub min_send_interval_ms: u64,
    pub max_rotations: u32,
    pub rotation_delay_ms: u64,
    pub transport_retry_base_ms: u64,
    pub transport_retry_max_ms: u64,
    /// Attempts per endpoint for transport failures, first one included
    pub transport_retry_attempts: u32,
    pub request_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
                "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
                "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
                "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
                "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
            ],
            min_send_interval_ms: 1_000,
            max_rotations: 4,
            rotation_delay_ms: 1_000,
            transport_retry_base_ms: 500,
            transport_retry_max_ms: 8_000,
            transport_retry_attempts: 3,
            request_timeout_ms: 10_000,
        }
    }
}

impl RelayConfig {
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }

    pub fn rotation_delay(&self) -> Duration {
        Duration::from_millis(self.rotation_delay_ms)
    }

    fn transport_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.transport_retry_attempts.max(1),
            self.transport_retry_base_ms,
            self.transport_retry_max_ms,
        )
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Wire encoding of one signed transaction: bincode, then base64
pub fn encode_transaction(tx: &VersionedTransaction) -> Result<String, BundleError> {
    let bytes = bincode::serialize(tx).map_err(|e| BundleError::Encoding(e.to_string()))?;
    Ok(BASE64.encode(bytes))
}

/// JSON-RPC `sendBundle` body for already-encoded transactions
pub fn send_bundle_body(encoded: &[String]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "sendBundle",
        "params": [encoded, { "encoding": "base64" }],
    })
}

/// Pull the bundle id out of a relay answer
pub fn parse_bundle_response(endpoint: &str, body: &str) -> Result<String, BundleError> {
    let parsed: JsonRpcResponse =
        serde_json::from_str(body).map_err(|e| BundleError::ProtocolViolation {
            endpoint: endpoint.to_string(),
            message: format!("unparseable response: {}", e),
        })?;

    if let Some(error) = parsed.error {
        if is_rate_limit_message(&error.message) {
            return Err(BundleError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        return Err(BundleError::Rejected {
            endpoint: endpoint.to_string(),
            message: match error.code {
                Some(code) => format!("{} (code {})", error.message, code),
                None => error.message,
            },
        });
    }

    match parsed.result {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        _ => Err(BundleError::ProtocolViolation {
            endpoint: endpoint.to_string(),
            message: "response carries no bundle id".to_string(),
        }),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Submits pre-signed transaction groups as atomic bundles
pub struct RelayBundleClient {
    http: reqwest::Client,
    config: RelayConfig,
    cursor: AtomicUsize,
    send_gate: DefaultDirectRateLimiter,
    watcher: Arc<ConfirmationWatcher>,
}

impl RelayBundleClient {
    pub fn new(config: RelayConfig, watcher: Arc<ConfirmationWatcher>) -> Result<Self, BundleError> {
        if config.endpoints.is_empty() {
            return Err(BundleError::NoEndpoints);
        }

        let quota = Quota::with_period(config.min_send_interval().max(Duration::from_millis(1)))
            .ok_or_else(|| BundleError::InvalidBundle("invalid relay send interval".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BundleError::Transport {
                endpoint: "client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            config,
            cursor: AtomicUsize::new(0),
            send_gate: RateLimiter::direct(quota),
            watcher,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn current_endpoint(&self) -> &str {
        let index = self.cursor.load(Ordering::Acquire) % self.config.endpoints.len();
        &self.config.endpoints[index]
    }

    /// Advance past `exhausted` unless another caller already moved the cursor
    fn rotate_from(&self, exhausted: usize) -> usize {
        let next = (exhausted + 1) % self.config.endpoints.len();
        match self
            .cursor
            .compare_exchange(exhausted, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => next,
            Err(current) => current % self.config.endpoints.len(),
        }
    }

    fn validate(transactions: &[VersionedTransaction]) -> Result<(), BundleError> {
        if transactions.is_empty() {
            return Err(BundleError::InvalidBundle("bundle has no transactions".to_string()));
        }
        if transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(BundleError::InvalidBundle(format!(
                "bundle has {} transactions, relay accepts at most {}",
                transactions.len(),
                MAX_BUNDLE_TRANSACTIONS
            )));
        }
        if let Some(index) = transactions
            .iter()
            .position(|tx| tx.signatures.is_empty() || tx.signatures[0] == Signature::default())
        {
            return Err(BundleError::InvalidBundle(format!(
                "transaction {} is not signed",
                index
            )));
        }
        Ok(())
    }

    /// Send the group as one bundle and return the relay's bundle id
    #[instrument(skip_all, fields(transactions = transactions.len()))]
    pub async fn submit_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String, BundleError> {
        let outcome = self.submit_inner(transactions).await;
        match &outcome {
            Ok(_) => metrics().bundles_sent.inc(),
            Err(_) => metrics().bundles_failed.inc(),
        }
        outcome
    }

    async fn submit_inner(&self, transactions: &[VersionedTransaction]) -> Result<String, BundleError> {
        Self::validate(transactions)?;
        let encoded = transactions
            .iter()
            .map(encode_transaction)
            .collect::<Result<Vec<_>, _>>()?;
        let body = send_bundle_body(&encoded);
        let ctx = TraceContext::new("bundle");

        let mut rotations = 0u32;
        loop {
            let index = self.cursor.load(Ordering::Acquire) % self.config.endpoints.len();
            let endpoint = &self.config.endpoints[index];

            match self.send_with_retry(endpoint, &body).await {
                Ok(bundle_id) => {
                    info!(
                        correlation_id = %ctx.correlation_id(),
                        endpoint = %endpoint,
                        bundle_id = %bundle_id,
                        rotations = rotations,
                        "Bundle accepted"
                    );
                    return Ok(bundle_id);
                }
                Err(BundleError::RateLimited { .. }) => {
                    if rotations >= self.config.max_rotations {
                        warn!(
                            correlation_id = %ctx.correlation_id(),
                            rotations = rotations,
                            "Relay rotations exhausted"
                        );
                        return Err(BundleError::RotationsExhausted { rotations });
                    }
                    rotations += 1;
                    let next = self.rotate_from(index);
                    metrics().relay_rotations.inc();
                    warn!(
                        correlation_id = %ctx.correlation_id(),
                        from = %endpoint,
                        to = %self.config.endpoints[next],
                        rotation = rotations,
                        "Relay rate limited, rotating endpoint"
                    );
                    tokio::time::sleep(self.config.rotation_delay()).await;
                }
                Err(e) => {
                    warn!(
                        correlation_id = %ctx.correlation_id(),
                        endpoint = %endpoint,
                        error = %e,
                        category = e.category(),
                        "Bundle submission failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn send_with_retry(&self, endpoint: &str, body: &Value) -> Result<String, BundleError> {
        RetryIf::spawn(
            self.config.transport_policy().delays(),
            || self.send_once(endpoint, body),
            |err: &BundleError| {
                let transient = err.is_transient();
                if transient {
                    debug!(endpoint = %endpoint, error = %err, "Relay transport failure, retrying");
                }
                transient
            },
        )
        .await
    }

    async fn send_once(&self, endpoint: &str, body: &Value) -> Result<String, BundleError> {
        self.send_gate.until_ready().await;

        let response = self
            .http
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| BundleError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BundleError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }

        let text = response.text().await.map_err(|e| BundleError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            if is_rate_limit_message(&text) {
                return Err(BundleError::RateLimited {
                    endpoint: endpoint.to_string(),
                });
            }
            return Err(BundleError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        parse_bundle_response(endpoint, &text)
    }

    /// Confirm a bundle through its first transaction's signature
    pub async fn confirm_bundle(&self, first_signature: &Signature, commitment: CommitmentConfig) -> ConfirmationResult {
        self.watcher.confirm(first_signature, commitment).await
    }

    /// Submit, then confirm via the first signature
    pub async fn submit_and_confirm_bundle(
        &self,
        transactions: &[VersionedTransaction],
        commitment: CommitmentConfig,
    ) -> Result<(String, ConfirmationResult), BundleError> {
        let bundle_id = self.submit_bundle(transactions).await?;
        let first = transactions
            .first()
            .and_then(compat::first_signature)
            .ok_or_else(|| BundleError::InvalidBundle("bundle has no signed transaction".to_string()))?;
        let result = self.confirm_bundle(&first, commitment).await;
        Ok((bundle_id, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc_manager::{RateLimitedDispatcher, RpcProfile};
    use crate::test_utils::{signed_transfer, MockLedgerRpc};
    use solana_sdk::signature::Keypair;
    use std::sync::Arc;

    fn client(endpoints: Vec<String>, min_send_interval_ms: u64) -> RelayBundleClient {
        let rpc = Arc::new(MockLedgerRpc::new());
        let watcher = Arc::new(ConfirmationWatcher::new(
            RateLimitedDispatcher::shared(RpcProfile::public()),
            rpc,
            None,
        ));
        RelayBundleClient::new(
            RelayConfig {
                endpoints,
                min_send_interval_ms,
                rotation_delay_ms: 5,
                transport_retry_base_ms: 5,
                transport_retry_max_ms: 20,
                ..RelayConfig::default()
            },
            watcher,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_bundle_response() {
        assert_eq!(
            parse_bundle_response("e", r#"{"jsonrpc":"2.0","result":"b1d","id":1}"#).unwrap(),
            "b1d"
        );
        assert!(matches!(
            parse_bundle_response("e", r#"{"jsonrpc":"2.0","id":1}"#),
            Err(BundleError::ProtocolViolation { .. })
        ));
        assert!(matches!(
            parse_bundle_response(
                "e",
                r#"{"jsonrpc":"2.0","error":{"code":-32097,"message":"Network congested. Endpoint is globally rate limited."},"id":1}"#
            ),
            Err(BundleError::RateLimited { .. })
        ));
        assert!(matches!(
            parse_bundle_response(
                "e",
                r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"bundle contains an already processed transaction"},"id":1}"#
            ),
            Err(BundleError::Rejected { .. })
        ));
    }

    #[test]
    fn test_rejection_quoting_an_id_with_429_is_not_rate_limited() {
        let err = parse_bundle_response(
            "e",
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"bundle contains an already processed transaction 3Nd429fW"},"id":1}"#,
        )
        .unwrap_err();
        match err {
            BundleError::Rejected { message, .. } => assert!(message.contains("(code -32602)")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_body_shape() {
        let payer = Keypair::new();
        let tx = signed_transfer(&payer);
        let encoded = encode_transaction(&tx).unwrap();
        let decoded: VersionedTransaction =
            bincode::deserialize(&BASE64.decode(&encoded).unwrap()).unwrap();
        assert_eq!(decoded.signatures, tx.signatures);

        let body = send_bundle_body(&[encoded.clone()]);
        assert_eq!(body["method"], "sendBundle");
        assert_eq!(body["params"][0][0], encoded);
        assert_eq!(body["params"][1]["encoding"], "base64");
    }

    #[tokio::test]
    async fn test_empty_and_unsigned_bundles_rejected() {
        let client = client(vec!["http://127.0.0.1:9/api/v1/bundles".to_string()], 10);

        assert!(matches!(
            client.submit_bundle(&[]).await,
            Err(BundleError::InvalidBundle(_))
        ));

        let mut unsigned = signed_transfer(&Keypair::new());
        unsigned.signatures[0] = Signature::default();
        assert!(matches!(
            client.submit_bundle(&[unsigned]).await,
            Err(BundleError::InvalidBundle(_))
        ));
    }

    #[test]
    fn test_rotation_wraps_and_ignores_stale_callers() {
        let client = client(
            vec!["http://a".to_string(), "http://b".to_string()],
            10,
        );
        assert_eq!(client.rotate_from(0), 1);
        assert_eq!(client.current_endpoint(), "http://b");
        // A second caller that also saw endpoint 0 must not skip past b
        assert_eq!(client.rotate_from(0), 1);
        assert_eq!(client.rotate_from(1), 0);
        assert_eq!(client.current_endpoint(), "http://a");
    }

    #[test]
    fn test_no_endpoints() {
        let rpc = Arc::new(MockLedgerRpc::new());
        let watcher = Arc::new(ConfirmationWatcher::new(
            RateLimitedDispatcher::shared(RpcProfile::public()),
            rpc,
            None,
        ));
        let config = RelayConfig {
            endpoints: vec![],
            ..RelayConfig::default()
        };
        assert!(matches!(
            RelayBundleClient::new(config, watcher),
            Err(BundleError::NoEndpoints)
        ));
    }
}
