//! Engine configuration
//!
//! Loaded from a TOML file, then `.env` and process environment overrides are applied,
//! then the result is validated. The RPC profile is resolved once from the result.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::confirmation::ws_url_from_http;
use crate::rpc_manager::{ProfileKind, RpcProfile};
use crate::tx_builder::instructions::MAX_COMPUTE_UNIT_LIMIT;
use crate::tx_builder::{BatchPolicy, RelayConfig, SubmitOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub rpc: RpcSection,

    #[serde(default)]
    pub submit: SubmitSection,

    #[serde(default)]
    pub batch: BatchSection,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSection {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Derived from `url` when unset
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Overrides detection from the URL
    #[serde(default)]
    pub profile: Option<ProfileKind>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentSetting {
    Processed,
    Confirmed,
    Finalized,
}

impl CommitmentSetting {
    pub fn to_config(self) -> CommitmentConfig {
        match self {
            CommitmentSetting::Processed => CommitmentConfig::processed(),
            CommitmentSetting::Confirmed => CommitmentConfig::confirmed(),
            CommitmentSetting::Finalized => CommitmentConfig::finalized(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSection {
    #[serde(default = "default_priority_fee")]
    pub priority_fee_micro_lamports: u64,

    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_commitment")]
    pub commitment: CommitmentSetting,

    #[serde(default)]
    pub skip_preflight: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// EnvFilter directive, `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_priority_fee() -> u64 { 200_000 }
fn default_compute_unit_limit() -> u32 { 300_000 }
fn default_max_retries() -> u32 { 3 }
fn default_commitment() -> CommitmentSetting { CommitmentSetting::Confirmed }
fn default_chunk_size() -> usize { 4 }
fn default_inter_chunk_delay_ms() -> u64 { 1_000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            ws_url: None,
            profile: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SubmitSection {
    fn default() -> Self {
        Self {
            priority_fee_micro_lamports: default_priority_fee(),
            compute_unit_limit: default_compute_unit_limit(),
            max_retries: default_max_retries(),
            commitment: default_commitment(),
            skip_preflight: false,
        }
    }
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// File (or defaults), then `.env` and environment overrides, then validation
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RPC_URL`, `RPC_WS_URL`, `RPC_PROFILE`, `RELAY_ENDPOINTS`,
    /// `PRIORITY_FEE_MICRO_LAMPORTS`, `COMPUTE_UNIT_LIMIT` and `BATCH_CHUNK_SIZE`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("RPC_URL") {
            self.rpc.url = url.trim().to_string();
        }
        if let Some(ws_url) = lookup("RPC_WS_URL") {
            self.rpc.ws_url = Some(ws_url.trim().to_string());
        }
        if let Some(profile) = lookup("RPC_PROFILE") {
            self.rpc.profile = Some(parse_env("RPC_PROFILE", &profile)?);
        }
        if let Some(endpoints) = lookup("RELAY_ENDPOINTS") {
            self.relay.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(fee) = lookup("PRIORITY_FEE_MICRO_LAMPORTS") {
            self.submit.priority_fee_micro_lamports = parse_env("PRIORITY_FEE_MICRO_LAMPORTS", &fee)?;
        }
        if let Some(limit) = lookup("COMPUTE_UNIT_LIMIT") {
            self.submit.compute_unit_limit = parse_env("COMPUTE_UNIT_LIMIT", &limit)?;
        }
        if let Some(chunk) = lookup("BATCH_CHUNK_SIZE") {
            self.batch.chunk_size = parse_env("BATCH_CHUNK_SIZE", &chunk)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.rpc.url) {
            return Err(ConfigError::Invalid(format!(
                "rpc.url must be an http(s) URL, got '{}'",
                self.rpc.url
            )));
        }
        if let Some(ws) = &self.rpc.ws_url {
            if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
                return Err(ConfigError::Invalid(format!(
                    "rpc.ws_url must be a ws(s) URL, got '{}'",
                    ws
                )));
            }
        }
        if self.submit.max_retries == 0 {
            return Err(ConfigError::Invalid("submit.max_retries must be > 0".to_string()));
        }
        if self.submit.compute_unit_limit > MAX_COMPUTE_UNIT_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "submit.compute_unit_limit must be <= {}",
                MAX_COMPUTE_UNIT_LIMIT
            )));
        }
        if self.batch.chunk_size == 0 {
            return Err(ConfigError::Invalid("batch.chunk_size must be > 0".to_string()));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.relay.endpoints {
            if !is_http_url(endpoint) {
                return Err(ConfigError::Invalid(format!(
                    "relay endpoint must be an http(s) URL, got '{}'",
                    endpoint
                )));
            }
            if !seen.insert(endpoint.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate relay endpoint '{}'",
                    endpoint
                )));
            }
        }

        self.rpc_profile().validate().map_err(ConfigError::Invalid)
    }

    /// The active provider profile; explicit override first, URL detection otherwise
    pub fn rpc_profile(&self) -> RpcProfile {
        RpcProfile::select(&self.rpc.url, self.rpc.profile)
    }

    pub fn ws_url(&self) -> String {
        self.rpc
            .ws_url
            .clone()
            .unwrap_or_else(|| ws_url_from_http(&self.rpc.url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.request_timeout_ms)
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            max_retries: self.submit.max_retries,
            commitment: self.submit.commitment.to_config(),
            priority_fee_micro_lamports: self.submit.priority_fee_micro_lamports,
            compute_unit_limit: self.submit.compute_unit_limit,
            skip_preflight: self.submit.skip_preflight,
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            chunk_size: self.batch.chunk_size,
            inter_chunk_delay: Duration::from_millis(self.batch.inter_chunk_delay_ms),
        }
    }
}
