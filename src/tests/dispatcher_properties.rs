//! Timing and concurrency properties of the shared dispatcher

use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::rpc_manager::{LedgerRpc, RateLimitedDispatcher, RpcProfile};
use crate::test_utils::MockLedgerRpc;

async fn fire(dispatcher: &RateLimitedDispatcher, rpc: &Arc<MockLedgerRpc>, n: usize) {
    let calls = (0..n).map(|_| {
        dispatcher.call("getBalance", || {
            let rpc = rpc.clone();
            async move { rpc.balance(&Pubkey::new_unique()).await }
        })
    });
    for result in join_all(calls).await {
        assert!(result.is_ok());
    }
}

#[tokio::test(start_paused = true)]
async fn dispatches_respect_call_interval() {
    for profile in [RpcProfile::public(), RpcProfile::premium()] {
        let rpc = Arc::new(MockLedgerRpc::new());
        let dispatcher = RateLimitedDispatcher::new(profile.clone());
        let n = 12;

        let started = Instant::now();
        fire(&dispatcher, &rpc, n).await;

        let floor = profile.call_interval() * (n as u32 - 1);
        assert!(
            started.elapsed() >= floor,
            "{:?}: {:?} < {:?}",
            profile.kind,
            started.elapsed(),
            floor
        );
        assert_eq!(dispatcher.stats().total_dispatches, n as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn in_flight_never_exceeds_ceiling() {
    for profile in [RpcProfile::public(), RpcProfile::premium()] {
        let rpc = Arc::new(MockLedgerRpc::new());
        // Slow calls so that many overlap
        rpc.set_latency(Duration::from_secs(2));
        let dispatcher = RateLimitedDispatcher::new(profile.clone());

        fire(&dispatcher, &rpc, 40).await;

        let stats = dispatcher.stats();
        assert!(stats.peak_in_flight <= profile.max_concurrent_requests);
        assert!(rpc.peak_concurrency() <= profile.max_concurrent_requests);
        assert_eq!(stats.peak_in_flight, profile.max_concurrent_requests);
        assert_eq!(stats.in_flight, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn independent_dispatchers_do_not_share_state() {
    let rpc = Arc::new(MockLedgerRpc::new());
    let first = RateLimitedDispatcher::new(RpcProfile::public());
    let second = RateLimitedDispatcher::new(RpcProfile::public());

    fire(&first, &rpc, 3).await;

    assert_eq!(first.stats().total_dispatches, 3);
    assert_eq!(second.stats().total_dispatches, 0);
}
