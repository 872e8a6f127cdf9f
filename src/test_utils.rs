//! Test doubles for the ledger RPC and signature notification seams
//!
//! These are only compiled when running tests or when the `test_utils` feature is
//! enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
#[allow(deprecated)]
use solana_sdk::system_instruction;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::confirmation::{SignatureNotification, SignatureSubscriber, SignatureSubscription};
use crate::rpc_manager::{LedgerRpc, RpcManagerError, SignatureStatus};
use crate::tx_builder::{TransactionRequest, TransactionRole};

const MOCK_ENDPOINT: &str = "mock://ledger";

/// Scriptable in-memory ledger.
///
/// Successful sends from the `land_from_send`-th onwards (1-based, default 1) land at
/// `Confirmed`. Statuses can also be set directly.
pub struct MockLedgerRpc {
    land_from_send: AtomicUsize,
    landed_err: Mutex<Option<String>>,
    hide_status_queries: AtomicUsize,
    fail_status: AtomicBool,
    latency: Mutex<Duration>,

    send_failures: Mutex<VecDeque<RpcManagerError>>,
    blockhash_failures: Mutex<VecDeque<RpcManagerError>>,

    statuses: Mutex<HashMap<Signature, SignatureStatus>>,
    status_seen: Mutex<HashMap<Signature, usize>>,
    balances: Mutex<HashMap<Pubkey, u64>>,

    sent: Mutex<Vec<Signature>>,
    compute_limits: Mutex<Vec<u32>>,
    send_attempts: AtomicUsize,
    blockhash_requests: AtomicUsize,
    status_queries: AtomicUsize,
    block_height: AtomicU64,

    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl Default for MockLedgerRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedgerRpc {
    pub fn new() -> Self {
        Self {
            land_from_send: AtomicUsize::new(1),
            landed_err: Mutex::new(None),
            hide_status_queries: AtomicUsize::new(0),
            fail_status: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            send_failures: Mutex::new(VecDeque::new()),
            blockhash_failures: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            status_seen: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            compute_limits: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            blockhash_requests: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
            block_height: AtomicU64::new(1_000),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        }
    }

    /// First successful send (1-based) that lands; `usize::MAX` for never
    pub fn land_from_send(&self, n: usize) {
        self.land_from_send.store(n, Ordering::SeqCst);
    }

    /// Landed transactions carry this on-chain error
    pub fn land_with_error(&self, err: impl Into<String>) {
        *self.landed_err.lock() = Some(err.into());
    }

    /// The first `n` status queries of every signature see nothing
    pub fn hide_status_queries(&self, n: usize) {
        self.hide_status_queries.store(n, Ordering::SeqCst);
    }

    pub fn fail_status_queries(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Latency added to every call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn fail_next_sends(&self, errors: Vec<RpcManagerError>) {
        self.send_failures.lock().extend(errors);
    }

    pub fn fail_next_blockhashes(&self, errors: Vec<RpcManagerError>) {
        self.blockhash_failures.lock().extend(errors);
    }

    pub fn set_status(&self, signature: Signature, level: CommitmentLevel, err: Option<String>) {
        self.statuses.lock().insert(
            signature,
            SignatureStatus {
                slot: 1,
                level,
                err,
            },
        );
    }

    pub fn set_balance(&self, pubkey: Pubkey, lamports: u64) {
        self.balances.lock().insert(pubkey, lamports);
    }

    /// Signatures of successful sends, in order
    pub fn sent_signatures(&self) -> Vec<Signature> {
        self.sent.lock().clone()
    }

    /// Compute unit limit of every send attempt, failed ones included
    pub fn sent_compute_limits(&self) -> Vec<u32> {
        self.compute_limits.lock().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn blockhash_requests(&self) -> usize {
        self.blockhash_requests.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    /// Most calls observed in progress at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now_active, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `SetComputeUnitLimit` value of a transaction, if it has one
pub fn compute_limit_of(tx: &VersionedTransaction) -> Option<u32> {
    let keys = tx.message.static_account_keys();
    tx.message.instructions().iter().find_map(|ix| {
        let program = keys.get(ix.program_id_index as usize)?;
        if *program != solana_sdk::compute_budget::id() || ix.data.first() != Some(&2) {
            return None;
        }
        let bytes: [u8; 4] = ix.data.get(1..5)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    })
}

#[async_trait]
impl LedgerRpc for MockLedgerRpc {
    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }

    async fn latest_blockhash(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), RpcManagerError> {
        self.blockhash_requests.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if let Some(err) = self.blockhash_failures.lock().pop_front() {
            return Err(err);
        }
        let height = self.block_height.fetch_add(1, Ordering::SeqCst);
        Ok((Hash::new_unique(), height + 150))
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _skip_preflight: bool,
        _commitment: CommitmentConfig,
    ) -> Result<Signature, RpcManagerError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = compute_limit_of(transaction) {
            self.compute_limits.lock().push(limit);
        }
        self.simulate_latency().await;

        if let Some(err) = self.send_failures.lock().pop_front() {
            return Err(err);
        }

        let signature = transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| RpcManagerError::Fatal("unsigned transaction".to_string()))?;

        let successful = {
            let mut sent = self.sent.lock();
            sent.push(signature);
            sent.len()
        };
        if successful >= self.land_from_send.load(Ordering::SeqCst) {
            let err = self.landed_err.lock().clone();
            self.set_status(signature, CommitmentLevel::Confirmed, err);
        }
        Ok(signature)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_status.load(Ordering::SeqCst) {
            return Err(RpcManagerError::Transport {
                endpoint: MOCK_ENDPOINT.to_string(),
                message: "connection reset".to_string(),
            });
        }

        let seen = {
            let mut status_seen = self.status_seen.lock();
            let count = status_seen.entry(*signature).or_insert(0);
            *count += 1;
            *count
        };
        if seen <= self.hide_status_queries.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.statuses.lock().get(signature).cloned())
    }

    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, RpcManagerError> {
        self.simulate_latency().await;
        Ok(self.balances.lock().get(pubkey).copied().unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
enum NotifyMode {
    Confirm,
    Fail(String),
    Silent,
    Unavailable,
}

/// Scriptable push notification source that records every listener it hands out
pub struct MockSubscriber {
    mode: NotifyMode,
    opened: AtomicUsize,
    feeds: Mutex<Vec<UnboundedSender<SignatureNotification>>>,
}

impl MockSubscriber {
    fn with_mode(mode: NotifyMode) -> Self {
        Self {
            mode,
            opened: AtomicUsize::new(0),
            feeds: Mutex::new(Vec::new()),
        }
    }

    /// Every subscription immediately reports success
    pub fn confirming() -> Self {
        Self::with_mode(NotifyMode::Confirm)
    }

    /// Every subscription immediately reports this on-chain error
    pub fn failing(err: impl Into<String>) -> Self {
        Self::with_mode(NotifyMode::Fail(err.into()))
    }

    /// Subscriptions stay open and never notify
    pub fn silent() -> Self {
        Self::with_mode(NotifyMode::Silent)
    }

    /// Subscribing always fails
    pub fn unavailable() -> Self {
        Self::with_mode(NotifyMode::Unavailable)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Listeners whose handle has been dropped
    pub fn released(&self) -> usize {
        self.feeds.lock().iter().filter(|feed| feed.is_closed()).count()
    }
}

#[async_trait]
impl SignatureSubscriber for MockSubscriber {
    async fn subscribe(
        &self,
        _signature: &Signature,
        _commitment: CommitmentConfig,
    ) -> Result<SignatureSubscription, RpcManagerError> {
        if matches!(self.mode, NotifyMode::Unavailable) {
            return Err(RpcManagerError::Transport {
                endpoint: "mock://pubsub".to_string(),
                message: "websocket closed".to_string(),
            });
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let (feed, subscription) = SignatureSubscription::channel();
        let notification = match &self.mode {
            NotifyMode::Confirm => Some(SignatureNotification { slot: 1, err: None }),
            NotifyMode::Fail(err) => Some(SignatureNotification {
                slot: 1,
                err: Some(err.clone()),
            }),
            _ => None,
        };
        if let Some(notification) = notification {
            let _ = feed.send(notification);
        }
        self.feeds.lock().push(feed);
        Ok(subscription)
    }
}

/// A one-instruction transfer request paid and signed by `payer`
pub fn transfer_request(payer: &Keypair) -> TransactionRequest {
    #[allow(deprecated)]
    let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1_000);
    TransactionRequest::new(payer.pubkey(), vec![ix], TransactionRole::Transfer)
}

/// A signed transfer ready for a bundle
pub fn signed_transfer(payer: &Keypair) -> VersionedTransaction {
    let request = transfer_request(payer);
    let payer = Arc::new(payer.insecure_clone());
    request
        .build(&[payer], Hash::new_unique(), 200_000, 0)
        .expect("transfer builds")
}
