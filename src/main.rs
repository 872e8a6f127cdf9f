//! Landing Engine CLI
//!
//! Thin operator front-end over the `landing_engine` library:
//!
//! - **estimate-cost**: fee, rent and buffer for a transaction shape
//! - **check-balance**: fetch a wallet balance and check it covers a transaction
//! - **confirm**: watch one or many signatures to a commitment level
//! - **show-config**: print the effective configuration after env overrides

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use landing_engine::config::{CommitmentSetting, EngineConfig, LoggingSection};
use landing_engine::cost_model;
use landing_engine::metrics::metrics;
use landing_engine::tx_builder::TransactionRole;
use landing_engine::ExecutionEngine;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "LANDING_ENGINE_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate fee and rent for a transaction
    EstimateCost {
        /// Priority fee in micro-lamports per compute unit (config default when unset)
        #[arg(long)]
        priority_fee: Option<u64>,

        /// Compute unit limit (config default when unset)
        #[arg(long)]
        compute_units: Option<u32>,

        /// Account types the transaction creates: basic, token, mint, multisig
        #[arg(long, value_delimiter = ',')]
        accounts: Vec<String>,

        /// Skip the 10% rent buffer
        #[arg(long)]
        no_buffer: bool,
    },

    /// Check that a wallet can pay for a transaction
    CheckBalance {
        /// Payer wallet address
        pubkey: String,

        /// Mint created by the transaction; prices in mint and token account rent
        #[arg(long)]
        mint: Option<String>,

        /// Lamports spent on top of fees and rent
        #[arg(long, default_value_t = 0)]
        extra: u64,
    },

    /// Confirm one or more signatures
    Confirm {
        #[arg(required = true)]
        signatures: Vec<String>,

        /// processed, confirmed or finalized (config default when unset)
        #[arg(long)]
        commitment: Option<String>,

        /// Override the profile's confirmation timeout (single signature only)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config_exists = std::path::Path::new(&args.config).exists();
    let config = if config_exists {
        EngineConfig::load(Some(&args.config))
            .with_context(|| format!("Failed to load config from {}", args.config))?
    } else {
        EngineConfig::load(None).context("Failed to load config from environment")?
    };

    // Initialize logging
    init_logging(&config.logging, args.verbose)?;

    info!("🚀 Starting Landing Engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        info!("📋 Loaded configuration from: {}", args.config);
    } else {
        warn!("Config file '{}' not found, using defaults and environment", args.config);
    }

    match args.command {
        Command::EstimateCost {
            priority_fee,
            compute_units,
            accounts,
            no_buffer,
        } => {
            let priority_fee = priority_fee.unwrap_or(config.submit.priority_fee_micro_lamports);
            let compute_units = compute_units.unwrap_or(config.submit.compute_unit_limit);
            let names: Vec<&str> = accounts.iter().map(String::as_str).collect();
            let cost = cost_model::total_cost_for_names(priority_fee, compute_units, &names, !no_buffer)?;

            info!("💰 Estimated cost: {} lamports", cost.total_lamports);
            println!("{}", serde_json::to_string_pretty(&cost)?);
        }

        Command::CheckBalance { pubkey, mint, extra } => {
            let payer = Pubkey::from_str(&pubkey).context("Invalid payer pubkey")?;
            let role = match mint {
                Some(mint) => TransactionRole::Create {
                    mint: Pubkey::from_str(&mint).context("Invalid mint pubkey")?,
                },
                None => TransactionRole::Transfer,
            };

            let engine = ExecutionEngine::from_config(&config)?;
            info!("🔑 Checking funding for {} ({})", payer, role.label());
            let options = engine.default_options();
            let check = engine.check_funding(&payer, &options, &role, extra).await?;
            let cost = engine.estimate_cost_for(&role, &options);

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "payer": payer.to_string(),
                    "role": role.label(),
                    "cost": cost,
                    "extra": extra,
                    "is_valid": check.is_valid,
                    "shortfall": check.shortfall,
                }))?
            );
        }

        Command::Confirm {
            signatures,
            commitment,
            timeout_ms,
        } => {
            let signatures = signatures
                .iter()
                .map(|s| Signature::from_str(s).with_context(|| format!("Invalid signature '{}'", s)))
                .collect::<Result<Vec<_>>>()?;
            let commitment = match commitment {
                Some(level) => parse_commitment(&level)?,
                None => config.submit.commitment,
            }
            .to_config();

            let engine = ExecutionEngine::from_config(&config)?;
            info!("👁️ Confirming {} signature(s) at {:?}", signatures.len(), commitment.commitment);

            if let [signature] = signatures.as_slice() {
                let timeout = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| config.rpc_profile().confirmation_timeout());
                let confirmed = engine.confirm(signature, commitment, timeout).await;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "signature": signature.to_string(),
                        "confirmed": confirmed,
                    }))?
                );
            } else {
                let confirmations = engine.confirm_batch(&signatures, commitment).await;
                println!("{}", serde_json::to_string_pretty(&confirmations)?);
            }

            let stats = engine.dispatcher_stats();
            info!(
                "📊 Dispatches: {} (rate-limit retries: {}, peak in flight: {})",
                stats.total_dispatches, stats.rate_limit_retries, stats.peak_in_flight
            );
        }

        Command::ShowConfig => {
            let profile = config.rpc_profile();
            info!("🌐 RPC profile: {:?}", profile.kind);
            println!("{}", toml::to_string_pretty(&config)?);
            println!("# effective profile\n{}", toml::to_string_pretty(&profile)?);
        }
    }

    if args.metrics {
        print!("{}", metrics().gather_text()?);
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(logging: &LoggingSection, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "landing_engine=debug,info".to_string()
    } else {
        logging.level.clone()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_filter))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

fn parse_commitment(level: &str) -> Result<CommitmentSetting> {
    match level.to_lowercase().as_str() {
        "processed" => Ok(CommitmentSetting::Processed),
        "confirmed" => Ok(CommitmentSetting::Confirmed),
        "finalized" => Ok(CommitmentSetting::Finalized),
        other => anyhow::bail!("Unknown commitment level '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landing_engine::cost_model::AccountType;

    #[test]
    fn test_cli_parses_subcommands() {
        let args = Args::parse_from([
            "landing-engine",
            "estimate-cost",
            "--accounts",
            "mint,token",
            "--priority-fee",
            "1000",
        ]);
        match args.command {
            Command::EstimateCost { accounts, priority_fee, .. } => {
                assert_eq!(accounts, vec!["mint", "token"]);
                assert_eq!(priority_fee, Some(1_000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_commitment() {
        assert_eq!(parse_commitment("Finalized").unwrap(), CommitmentSetting::Finalized);
        assert!(parse_commitment("rooted").is_err());
    }

    #[test]
    fn test_account_type_names_match_cli() {
        for name in ["basic", "token", "mint", "multisig"] {
            assert!(name.parse::<AccountType>().is_ok());
        }
    }
}
