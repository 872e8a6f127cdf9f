//! Bundle confirmation through the first signature

use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::signature::Keypair;
use std::sync::Arc;

use super::test_helpers::engine_with;
use crate::compat::first_signature;
use crate::rpc_manager::RpcProfile;
use crate::test_utils::{signed_transfer, MockLedgerRpc, MockSubscriber};
use crate::types::{ConfirmationMethod, ConfirmationOutcome};

#[tokio::test(start_paused = true)]
async fn first_signature_confirmed_means_bundle_confirmed() {
    let bundle = vec![signed_transfer(&Keypair::new()), signed_transfer(&Keypair::new())];
    let first = first_signature(&bundle[0]).unwrap();
    let engine = engine_with(
        Arc::new(MockLedgerRpc::new()),
        Arc::new(MockSubscriber::confirming()),
        RpcProfile::premium(),
    );

    let result = engine.confirm_bundle(&first, CommitmentConfig::confirmed()).await;

    assert!(result.is_confirmed());
    assert_eq!(result.method, ConfirmationMethod::Push);
}

#[tokio::test(start_paused = true)]
async fn first_signature_error_means_bundle_failed() {
    let bundle = vec![signed_transfer(&Keypair::new())];
    let first = first_signature(&bundle[0]).unwrap();
    let engine = engine_with(
        Arc::new(MockLedgerRpc::new()),
        Arc::new(MockSubscriber::failing("InstructionError(1, Custom(6003))")),
        RpcProfile::premium(),
    );

    let result = engine.confirm_bundle(&first, CommitmentConfig::confirmed()).await;

    assert_eq!(result.outcome, ConfirmationOutcome::Failed);
    assert!(result.error.unwrap_or_default().contains("Custom(6003)"));
}

#[tokio::test(start_paused = true)]
async fn dropped_bundle_times_out_without_claiming_failure() {
    let bundle = vec![signed_transfer(&Keypair::new())];
    let first = first_signature(&bundle[0]).unwrap();
    let rpc = Arc::new(MockLedgerRpc::new());
    let subscriber = Arc::new(MockSubscriber::silent());
    let engine = engine_with(rpc.clone(), subscriber.clone(), RpcProfile::premium());

    let result = engine.confirm_bundle(&first, CommitmentConfig::confirmed()).await;
    assert!(result.is_timed_out());
    assert_eq!(subscriber.released(), 1);

    // Landed late: a fresh confirmation finds it through the fallback poll
    rpc.set_status(first, CommitmentLevel::Confirmed, None);
    let result = engine.confirm_bundle(&first, CommitmentConfig::confirmed()).await;
    assert!(result.is_confirmed());
    assert_eq!(result.method, ConfirmationMethod::PollFallback);
}
