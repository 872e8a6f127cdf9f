//! Configuration loading from disk and cost estimation through the public API

use landing_engine::config::{ConfigError, EngineConfig};
use landing_engine::cost_model::{self, AccountType, CostError};
use landing_engine::rpc_manager::{ProfileKind, RpcProfile};
use landing_engine::tx_builder::TransactionRole;
use solana_sdk::pubkey::Pubkey;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn test_config_file_round_trips_into_components() {
    let file = write_config(
        r#"
        [rpc]
        url = "https://mainnet.helius-rpc.com/?api-key=test"
        request_timeout_ms = 15000

        [submit]
        priority_fee_micro_lamports = 100000
        compute_unit_limit = 250000
        max_retries = 4

        [batch]
        chunk_size = 8
        inter_chunk_delay_ms = 250

        [relay]
        endpoints = ["https://relay-a.example/api/v1/bundles", "https://relay-b.example/api/v1/bundles"]
        max_rotations = 1

        [logging]
        level = "debug"
        json = true
        "#,
    );

    let config = EngineConfig::from_file(file.path().to_str().unwrap()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.rpc_profile(), RpcProfile::premium());
    assert_eq!(config.ws_url(), "wss://mainnet.helius-rpc.com/?api-key=test");
    assert_eq!(config.request_timeout(), Duration::from_secs(15));

    let options = config.submit_options();
    assert_eq!(options.max_retries, 4);
    assert_eq!(options.compute_unit_limit, 250_000);
    assert_eq!(options.priority_fee_micro_lamports, 100_000);

    let policy = config.batch_policy();
    assert_eq!(policy.chunk_size, 8);
    assert_eq!(policy.inter_chunk_delay, Duration::from_millis(250));

    assert_eq!(config.relay.endpoints.len(), 2);
    assert_eq!(config.relay.max_rotations, 1);
    // Unset relay fields keep their defaults
    assert_eq!(config.relay.min_send_interval_ms, 1_000);
    assert!(config.logging.json);
}

#[test]
fn test_public_cluster_url_selects_public_profile() {
    let file = write_config("[rpc]\nurl = \"https://api.devnet.solana.com\"\n");
    let config = EngineConfig::from_file(file.path().to_str().unwrap()).unwrap();

    let profile = config.rpc_profile();
    assert_eq!(profile.kind, ProfileKind::Public);
    assert!(!profile.use_push_confirmation);
}

#[test]
fn test_missing_and_malformed_files() {
    let err = EngineConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));

    let file = write_config("[batch]\nchunk_size = \"four\"\n");
    let err = EngineConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let file = write_config("[batch]\nchunk_size = 0\n");
    let config = EngineConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_create_role_cost_covers_mint_and_token_rent() {
    let role = TransactionRole::Create { mint: Pubkey::new_unique() };
    let cost = cost_model::total_cost(200_000, 300_000, &role.created_accounts(), true);

    assert_eq!(cost.base_fee_lamports, 5_000);
    assert_eq!(cost.priority_fee_lamports, 60_000);
    assert_eq!(cost.total_rent(), 1_461_600 + 2_039_280);
    assert_eq!(cost.buffer_lamports, 350_088);
    assert_eq!(
        cost.total_lamports,
        5_000 + 60_000 + 1_461_600 + 2_039_280 + 350_088
    );

    let check = cost_model::validate_balance(cost.total_lamports, &cost, 1);
    assert!(!check.is_valid);
    assert_eq!(check.shortfall, 1);
}

#[test]
fn test_unknown_account_type_is_rejected() {
    assert!(matches!(
        cost_model::rent_exemption_for("vault"),
        Err(CostError::UnknownAccountType(_))
    ));
    assert_eq!(cost_model::rent_exemption_for("token").unwrap(), cost_model::rent_exemption(AccountType::Token));
}
