//! Signature confirmation: push notifications with a single poll as last-chance check
//!
//! `ConfirmationWatcher::confirm` resolves one signature to a [`ConfirmationResult`]:
//!
//! ```text
//! Subscribed ──notification(ok)──▶ Confirmed (push)
//!     │      ──notification(err)─▶ Failed    (push)
//!     └──timeout / stream end──▶ one status poll ──▶ Confirmed | Failed | TimedOut
//! ```
//!
//! Profiles without push confirmation skip the subscription and poll until the
//! commitment is reached or the same timeout expires. Every status query goes through
//! the dispatcher.

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::RpcSignatureSubscribeConfig;
use solana_client::rpc_response::{Response as RpcResponse, RpcSignatureResult};
use solana_sdk::{commitment_config::CommitmentConfig, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::metrics::metrics;
use crate::rpc_manager::{LedgerRpc, RateLimitedDispatcher, RpcManagerError, SignatureStatus};
use crate::types::{ConfirmationMethod, ConfirmationResult};

/// Spacing between status queries when push confirmation is off
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A processed-signature notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureNotification {
    pub slot: u64,
    pub err: Option<String>,
}

impl SignatureNotification {
    /// `None` for "received" notifications, which say nothing about execution
    pub fn from_response(response: RpcResponse<RpcSignatureResult>) -> Option<Self> {
        match response.value {
            RpcSignatureResult::ProcessedSignature(result) => Some(Self {
                slot: response.context.slot,
                err: result.err.map(|e| format!("{:?}", e)),
            }),
            RpcSignatureResult::ReceivedSignature(_) => None,
        }
    }
}

/// Handle to one open signature listener.
///
/// Dropping the handle releases the listener: the producer side observes the closed
/// channel and unsubscribes.
#[derive(Debug)]
pub struct SignatureSubscription {
    notifications: mpsc::UnboundedReceiver<SignatureNotification>,
}

impl SignatureSubscription {
    /// Producer half plus the handle given to the watcher
    pub fn channel() -> (mpsc::UnboundedSender<SignatureNotification>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { notifications: rx })
    }

    /// Next notification, or `None` once the producer has gone away
    pub async fn next(&mut self) -> Option<SignatureNotification> {
        self.notifications.recv().await
    }
}

/// Source of push notifications for signatures
#[async_trait]
pub trait SignatureSubscriber: Send + Sync {
    async fn subscribe(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<SignatureSubscription, RpcManagerError>;
}

/// Websocket URL for an http(s) RPC URL
pub fn ws_url_from_http(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

/// [`SignatureSubscriber`] over the solana pubsub websocket.
///
/// One websocket connection is opened lazily and shared by every subscription.
pub struct PubsubSignatureSubscriber {
    ws_url: String,
    client: OnceCell<Arc<PubsubClient>>,
}

impl PubsubSignatureSubscriber {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<Arc<PubsubClient>, RpcManagerError> {
        self.client
            .get_or_try_init(|| async {
                debug!(ws_url = %self.ws_url, "Connecting pubsub client");
                PubsubClient::new(&self.ws_url)
                    .await
                    .map(Arc::new)
                    .map_err(|e| RpcManagerError::Transport {
                        endpoint: self.ws_url.clone(),
                        message: e.to_string(),
                    })
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl SignatureSubscriber for PubsubSignatureSubscriber {
    async fn subscribe(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<SignatureSubscription, RpcManagerError> {
        let client = self.client().await?;
        let (tx, subscription) = SignatureSubscription::channel();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let signature = *signature;

        // The stream borrows the client, so both live in the task
        tokio::spawn(async move {
            let config = RpcSignatureSubscribeConfig {
                commitment: Some(commitment),
                enable_received_notification: Some(false),
            };
            let (mut stream, unsubscribe) =
                match client.signature_subscribe(&signature, Some(config)).await {
                    Ok(subscribed) => {
                        let _ = ready_tx.send(Ok(()));
                        subscribed
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    item = stream.next() => match item {
                        Some(response) => {
                            if let Some(notification) = SignatureNotification::from_response(response) {
                                if tx.send(notification).is_err() {
                                    break;
                                }
                            }
                        }
                        None => break,
                    },
                }
            }
            unsubscribe().await;
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(subscription),
            Ok(Err(message)) => Err(RpcManagerError::Transport {
                endpoint: self.ws_url.clone(),
                message,
            }),
            Err(_) => Err(RpcManagerError::Internal(
                "signature subscription task exited".to_string(),
            )),
        }
    }
}

/// Resolves signatures to a terminal [`ConfirmationResult`]
pub struct ConfirmationWatcher {
    dispatcher: Arc<RateLimitedDispatcher>,
    rpc: Arc<dyn LedgerRpc>,
    subscriber: Option<Arc<dyn SignatureSubscriber>>,
    poll_interval: Duration,
}

impl ConfirmationWatcher {
    pub fn new(
        dispatcher: Arc<RateLimitedDispatcher>,
        rpc: Arc<dyn LedgerRpc>,
        subscriber: Option<Arc<dyn SignatureSubscriber>>,
    ) -> Self {
        Self {
            dispatcher,
            rpc,
            subscriber,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dispatcher(&self) -> &Arc<RateLimitedDispatcher> {
        &self.dispatcher
    }

    fn push_enabled(&self) -> Option<&Arc<dyn SignatureSubscriber>> {
        if self.dispatcher.profile().use_push_confirmation {
            self.subscriber.as_ref()
        } else {
            None
        }
    }

    /// Watch `signature` until `commitment` or the profile's confirmation timeout
    pub async fn confirm(&self, signature: &Signature, commitment: CommitmentConfig) -> ConfirmationResult {
        let timeout = self.dispatcher.profile().confirmation_timeout();
        self.confirm_with_timeout(signature, commitment, timeout).await
    }

    #[instrument(skip(self), fields(signature = %signature))]
    pub async fn confirm_with_timeout(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
        timeout: Duration,
    ) -> ConfirmationResult {
        let deadline = Instant::now() + timeout;

        let result = match self.push_enabled() {
            Some(subscriber) => match subscriber.subscribe(signature, commitment).await {
                Ok(subscription) => {
                    self.watch_push(signature, commitment, deadline, subscription)
                        .await
                }
                Err(e) => {
                    warn!(error = %e, "Signature subscription failed, polling instead");
                    self.poll_until(signature, commitment, deadline).await
                }
            },
            None => self.poll_until(signature, commitment, deadline).await,
        };

        metrics().record_confirmation(result.method.as_str(), result.outcome.as_str());
        debug!(
            outcome = result.outcome.as_str(),
            method = %result.method,
            "Confirmation finished"
        );
        result
    }

    async fn watch_push(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
        deadline: Instant,
        mut subscription: SignatureSubscription,
    ) -> ConfirmationResult {
        metrics().active_subscriptions.inc();
        let _active = scopeguard::guard((), |_| metrics().active_subscriptions.dec());

        let notified = tokio::time::timeout_at(deadline, subscription.next()).await;
        // Release the listener before any fallback work
        drop(subscription);

        match notified {
            Ok(Some(notification)) => match notification.err {
                None => ConfirmationResult::confirmed(ConfirmationMethod::Push),
                Some(err) => ConfirmationResult::failed(ConfirmationMethod::Push, err),
            },
            Ok(None) => {
                debug!("Notification stream closed early");
                self.fallback_poll(signature, commitment).await
            }
            Err(_) => {
                debug!("No notification before deadline");
                self.fallback_poll(signature, commitment).await
            }
        }
    }

    /// Exactly one status query after a push timeout
    async fn fallback_poll(&self, signature: &Signature, commitment: CommitmentConfig) -> ConfirmationResult {
        match self.check_status(signature).await {
            Ok(Some(status)) => Self::resolve(&status, commitment)
                .unwrap_or_else(|| ConfirmationResult::timed_out(ConfirmationMethod::PollFallback, None)),
            Ok(None) => ConfirmationResult::timed_out(ConfirmationMethod::PollFallback, None),
            Err(e) => ConfirmationResult::timed_out(
                ConfirmationMethod::PollFallback,
                Some(format!("fallback status poll failed: {}", e)),
            ),
        }
    }

    async fn poll_until(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
        deadline: Instant,
    ) -> ConfirmationResult {
        let mut last_error: Option<String> = None;

        let polled = tokio::time::timeout_at(deadline, async {
            loop {
                match self.check_status(signature).await {
                    Ok(Some(status)) => {
                        if let Some(result) = Self::resolve(&status, commitment) {
                            return result;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(error = %e, "Status poll failed");
                        last_error = Some(e.to_string());
                    }
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        })
        .await;

        polled.unwrap_or_else(|_| ConfirmationResult::timed_out(ConfirmationMethod::PollFallback, last_error))
    }

    fn resolve(status: &SignatureStatus, commitment: CommitmentConfig) -> Option<ConfirmationResult> {
        if let Some(err) = &status.err {
            return Some(ConfirmationResult::failed(
                ConfirmationMethod::PollFallback,
                err.clone(),
            ));
        }
        status
            .satisfies(commitment)
            .then(|| ConfirmationResult::confirmed(ConfirmationMethod::PollFallback))
    }

    /// One dispatcher-mediated status query
    pub async fn check_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, RpcManagerError> {
        self.dispatcher
            .call("getSignatureStatuses", || self.rpc.signature_status(signature))
            .await
    }
}
