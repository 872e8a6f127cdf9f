use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Lock-free dispatch counters for one RPC profile
#[derive(Debug, Default)]
pub struct AtomicDispatchStats {
    /// Calls handed to the provider (each retry counts)
    pub total_dispatches: AtomicU64,

    /// Calls that returned an error
    pub total_errors: AtomicU64,

    /// Retries triggered by a rate-limit rejection
    pub rate_limit_retries: AtomicU64,

    /// Calls currently in flight
    pub in_flight: AtomicUsize,

    /// Highest `in_flight` ever observed
    pub peak_in_flight: AtomicUsize,

    /// Last known latency in microseconds
    pub last_latency_us: AtomicU64,
}

/// Point-in-time copy of [`AtomicDispatchStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub total_dispatches: u64,
    pub total_errors: u64,
    pub rate_limit_retries: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub last_latency_us: u64,
}

impl AtomicDispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a call as started
    pub fn enter(&self) {
        self.total_dispatches.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// Mark a call as finished, whatever its outcome
    pub fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn record_result(&self, success: bool, latency: Duration) {
        if !success {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.last_latency_us
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_rate_limit_retry(&self) {
        self.rate_limit_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            total_dispatches: self.total_dispatches.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            rate_limit_retries: self.rate_limit_retries.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            last_latency_us: self.last_latency_us.load(Ordering::Relaxed),
        }
    }
}
