//! End-to-end submission scenarios against the mock ledger

use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::pubkey::Pubkey;
#[allow(deprecated)]
use solana_sdk::system_instruction;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::test_helpers::engine_with;
use crate::rpc_manager::{RpcManagerError, RpcProfile};
use crate::test_utils::{transfer_request, MockLedgerRpc, MockSubscriber};
use crate::tx_builder::{SubmitError, SubmitOptions, TransactionRequest, TransactionRole};
use crate::types::ConfirmationMethod;

#[tokio::test(start_paused = true)]
async fn landed_signature_is_not_resent() {
    // Lands on the first send, but the first status lookup misses it
    let rpc = Arc::new(MockLedgerRpc::new());
    rpc.hide_status_queries(1);
    let subscriber = Arc::new(MockSubscriber::silent());
    let engine = engine_with(rpc.clone(), subscriber.clone(), RpcProfile::premium());
    let payer = Arc::new(Keypair::new());

    let receipt = engine
        .submit(&transfer_request(&payer), &[payer.clone()], None)
        .await
        .unwrap();

    assert_eq!(rpc.send_attempts(), 1);
    assert_eq!(rpc.sent_signatures(), vec![receipt.signature]);
    assert_eq!(receipt.attempts, 1);
    assert_eq!(receipt.method, ConfirmationMethod::PollFallback);
    assert_eq!(subscriber.released(), subscriber.opened());
}

#[tokio::test(start_paused = true)]
async fn earlier_attempt_landing_late_is_not_resent() {
    let rpc = Arc::new(MockLedgerRpc::new());
    rpc.land_from_send(usize::MAX);
    let subscriber = Arc::new(MockSubscriber::silent());
    let engine = engine_with(rpc.clone(), subscriber, RpcProfile::premium());
    let payer = Arc::new(Keypair::new());

    // Attempt 1 times out at 30s; attempt 2's send fails; attempt 1 lands before attempt 3
    let ledger = rpc.clone();
    let timeline = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(20)).await;
        ledger.fail_next_sends(vec![RpcManagerError::Transport {
            endpoint: "mock".into(),
            message: "connection reset".into(),
        }]);
        tokio::time::sleep(Duration::from_secs(11)).await;
        let first = ledger.sent_signatures()[0];
        ledger.set_status(first, CommitmentLevel::Confirmed, None);
    });

    let receipt = engine
        .submit(&transfer_request(&payer), &[payer.clone()], None)
        .await
        .unwrap();
    timeline.await.unwrap();

    assert_eq!(rpc.sent_signatures(), vec![receipt.signature]);
    assert_eq!(rpc.send_attempts(), 2);
    assert_eq!(receipt.attempts, 2);
    assert_eq!(receipt.method, ConfirmationMethod::PollFallback);
}

#[tokio::test(start_paused = true)]
async fn two_timeouts_then_fallback_poll_lands() {
    let rpc = Arc::new(MockLedgerRpc::new());
    rpc.land_from_send(3);
    let subscriber = Arc::new(MockSubscriber::silent());
    let engine = engine_with(rpc.clone(), subscriber.clone(), RpcProfile::premium());
    let payer = Arc::new(Keypair::new());

    let started = Instant::now();
    let receipt = engine
        .submit(&transfer_request(&payer), &[payer.clone()], None)
        .await
        .unwrap();

    assert_eq!(receipt.attempts, 3);
    assert_eq!(receipt.method, ConfirmationMethod::PollFallback);
    assert_eq!(rpc.send_attempts(), 3);
    assert_eq!(rpc.sent_compute_limits(), vec![300_000, 330_000, 363_000]);
    assert_eq!(subscriber.opened(), 3);
    assert_eq!(subscriber.released(), 3);

    // Three full confirmation windows plus two timing backoffs
    let window = RpcProfile::premium().confirmation_timeout();
    assert!(started.elapsed() >= window * 3 + Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn missing_mint_signer_is_fatal() {
    let rpc = Arc::new(MockLedgerRpc::new());
    let engine = engine_with(rpc.clone(), Arc::new(MockSubscriber::confirming()), RpcProfile::premium());
    let payer = Arc::new(Keypair::new());
    let mint = Keypair::new();

    #[allow(deprecated)]
    let ix = system_instruction::create_account(&payer.pubkey(), &mint.pubkey(), 1_461_600, 82, &Pubkey::new_unique());
    let request = TransactionRequest::new(
        payer.pubkey(),
        vec![ix],
        TransactionRole::Create { mint: mint.pubkey() },
    );

    let err = engine
        .submit(&request, &[payer.clone()], None)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, SubmitError::MissingSigner { ref pubkey } if *pubkey == mint.pubkey().to_string()));
    assert_eq!(rpc.send_attempts(), 0);

    // With the mint signer present the same request lands
    let receipt = engine
        .submit(&request, &[payer.clone(), Arc::new(mint)], None)
        .await
        .unwrap();
    assert_eq!(receipt.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn on_chain_funding_failure_stops_retries() {
    let rpc = Arc::new(MockLedgerRpc::new());
    let engine = engine_with(
        rpc.clone(),
        Arc::new(MockSubscriber::failing("InsufficientFundsForRent { account_index: 1 }")),
        RpcProfile::premium(),
    );
    let payer = Arc::new(Keypair::new());

    let err = engine
        .submit(
            &transfer_request(&payer),
            &[payer.clone()],
            Some(SubmitOptions {
                max_retries: 5,
                ..SubmitOptions::default()
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::InsufficientFunds(_)));
    assert_eq!(rpc.send_attempts(), 1);
}
