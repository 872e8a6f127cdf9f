//! Batch fan-out: chunking, pacing and per-item isolation

use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::signature::{Keypair, Signature};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::test_helpers::{engine_with, transfer_items};
use crate::rpc_manager::RpcProfile;
use crate::test_utils::{MockLedgerRpc, MockSubscriber};

#[tokio::test(start_paused = true)]
async fn ten_items_run_in_three_paced_chunks() {
    let rpc = Arc::new(MockLedgerRpc::new());
    let engine = engine_with(rpc.clone(), Arc::new(MockSubscriber::confirming()), RpcProfile::premium());
    let items = transfer_items(10);

    let started = Instant::now();
    let report = engine.execute_batch(&items, Some(4)).await;

    assert_eq!(report.chunks, 3);
    assert_eq!(report.results.len(), 10);
    assert_eq!(report.successes(), 10);
    assert_eq!(rpc.send_attempts(), 10);
    // Default inter-chunk delay is one second, applied between chunks only
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn one_bad_item_does_not_sink_the_batch() {
    let rpc = Arc::new(MockLedgerRpc::new());
    let engine = engine_with(rpc.clone(), Arc::new(MockSubscriber::confirming()), RpcProfile::premium());
    let mut items = transfer_items(5);
    // Signed by the wrong wallet
    items[2].signers = vec![Arc::new(Keypair::new())];

    let report = engine.execute_batch(&items, None).await;

    assert_eq!(report.successes(), 4);
    assert_eq!(report.failures(), 1);
    let failed = &report.results[2];
    assert_eq!(failed.id, "wallet-2");
    assert!(!failed.success);
    assert!(failed.signature.is_none());
    assert!(failed.error.as_deref().unwrap_or_default().contains("Missing required signer"));
    for (index, result) in report.results.iter().enumerate().filter(|(i, _)| *i != 2) {
        assert_eq!(result.id, format!("wallet-{index}"));
        assert!(result.success);
        assert!(result.signature.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn confirm_batch_reports_each_signature() {
    let rpc = Arc::new(MockLedgerRpc::new());
    let landed = Signature::new_unique();
    let reverted = Signature::new_unique();
    let unknown = Signature::new_unique();
    rpc.set_status(landed, CommitmentLevel::Confirmed, None);
    rpc.set_status(reverted, CommitmentLevel::Confirmed, Some("InstructionError(0, Custom(6001))".into()));

    // Poll mode: the public profile has push disabled
    let engine = engine_with(rpc, Arc::new(MockSubscriber::silent()), RpcProfile::public());
    let confirmations = engine
        .confirm_batch(&[landed, reverted, unknown], CommitmentConfig::confirmed())
        .await;

    let flags: Vec<_> = confirmations.iter().map(|c| c.confirmed).collect();
    assert_eq!(flags, vec![true, false, false]);
    assert_eq!(confirmations[2].signature, unknown.to_string());
}
