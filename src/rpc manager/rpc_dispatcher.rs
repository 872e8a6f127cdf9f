//! Rate-limited dispatch of RPC calls against a single provider profile
//!
//! Every outbound call to the RPC provider goes through [`RateLimitedDispatcher::call`]:
//! - a semaphore bounds in-flight calls to `max_concurrent_requests`
//! - a reserved dispatch timestamp spaces calls by at least `call_interval_ms`
//! - rate-limit rejections are retried with doubling backoff seeded at `retry_backoff_ms`
//!
//! Any other error is returned to the caller untouched.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use super::rpc_atomics::{AtomicDispatchStats, DispatchStatsSnapshot};
use super::rpc_config::RpcProfile;
use super::rpc_errors::{RetryPolicy, RpcManagerError};
use crate::metrics::metrics;

/// Attempts (first call included) before a rate-limit rejection is surfaced
pub const RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;

/// Hard ceiling for a single rate-limit backoff sleep
pub const RATE_LIMIT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Throttles and retries all calls to one RPC provider.
///
/// One instance per process and profile; share it behind an `Arc`.
#[derive(Debug)]
pub struct RateLimitedDispatcher {
    profile: RpcProfile,
    slots: Semaphore,
    last_dispatch: Mutex<Option<Instant>>,
    stats: AtomicDispatchStats,
    rate_limit_policy: RetryPolicy,
}

impl RateLimitedDispatcher {
    pub fn new(profile: RpcProfile) -> Self {
        let rate_limit_policy = RetryPolicy::new(
            RATE_LIMIT_MAX_ATTEMPTS,
            profile.retry_backoff_ms,
            RATE_LIMIT_BACKOFF_CAP.as_millis() as u64,
        );
        Self {
            slots: Semaphore::new(profile.max_concurrent_requests.max(1)),
            profile,
            last_dispatch: Mutex::new(None),
            stats: AtomicDispatchStats::new(),
            rate_limit_policy,
        }
    }

    pub fn shared(profile: RpcProfile) -> Arc<Self> {
        Arc::new(Self::new(profile))
    }

    pub fn profile(&self) -> &RpcProfile {
        &self.profile
    }

    pub fn in_flight(&self) -> usize {
        self.stats.in_flight()
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run `op` under the profile's concurrency ceiling and call interval.
    ///
    /// `op` is invoked again for each rate-limit retry, so it must build a fresh request.
    pub async fn call<T, F, Fut>(&self, op_name: &'static str, op: F) -> Result<T, RpcManagerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RpcManagerError>>,
    {
        let op = &op;
        RetryIf::spawn(
            self.rate_limit_policy.delays(),
            move || self.dispatch_once(op_name, op),
            |err: &RpcManagerError| {
                if !err.is_rate_limited() {
                    return false;
                }
                self.stats.record_rate_limit_retry();
                metrics().rate_limit_retries.inc();
                warn!(op = op_name, error = %err, "Rate limited, backing off");
                true
            },
        )
        .await
    }

    async fn dispatch_once<T, F, Fut>(&self, op_name: &'static str, op: &F) -> Result<T, RpcManagerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RpcManagerError>>,
    {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| RpcManagerError::Internal("dispatcher slots closed".to_string()))?;

        self.wait_for_interval().await;

        self.stats.enter();
        metrics().rpc_in_flight.inc();
        let _in_flight = scopeguard::guard(&self.stats, |stats| {
            stats.leave();
            metrics().rpc_in_flight.dec();
        });

        let started = Instant::now();
        let result = op().await;
        let latency = started.elapsed();

        self.stats.record_result(result.is_ok(), latency);
        metrics().rpc_dispatches.inc();
        metrics().rpc_latency.observe(latency.as_secs_f64());
        debug!(
            op = op_name,
            latency_ms = latency.as_millis() as u64,
            ok = result.is_ok(),
            "RPC dispatch finished"
        );

        result
    }

    /// Reserve the next dispatch instant and sleep until it.
    ///
    /// The reservation is a single non-yielding read-modify-write, so concurrent callers
    /// always end up at least `call_interval` apart.
    async fn wait_for_interval(&self) {
        let interval = self.profile.call_interval();
        let scheduled = {
            let mut last = self.last_dispatch.lock();
            let now = Instant::now();
            let at = match *last {
                Some(prev) if prev + interval > now => prev + interval,
                _ => now,
            };
            *last = Some(at);
            at
        };
        tokio::time::sleep_until(scheduled).await;
    }
}
