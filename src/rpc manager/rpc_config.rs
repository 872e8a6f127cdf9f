use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hosts of the free public clusters; anything else is treated as a premium provider.
const PUBLIC_RPC_HOSTS: &[&str] = &[
    "api.mainnet-beta.solana.com",
    "api.devnet.solana.com",
    "api.testnet.solana.com",
];

/// Which of the two canonical provider tiers is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Public,
    Premium,
}

impl ProfileKind {
    /// Pick the tier for an RPC URL
    pub fn for_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if PUBLIC_RPC_HOSTS.iter().any(|host| lower.contains(host)) {
            ProfileKind::Public
        } else {
            ProfileKind::Premium
        }
    }
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" | "free" => Ok(ProfileKind::Public),
            "premium" => Ok(ProfileKind::Premium),
            other => Err(format!("unknown RPC profile '{}'", other)),
        }
    }
}

/// Throttling and confirmation parameters for one RPC provider.
///
/// Selected once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcProfile {
    pub kind: ProfileKind,

    /// Minimum spacing between two dispatches
    pub call_interval_ms: u64,

    /// Ceiling on concurrently in-flight calls
    pub max_concurrent_requests: usize,

    /// Seed of the exponential backoff applied to rate-limit rejections
    pub retry_backoff_ms: u64,

    pub confirmation_timeout_ms: u64,

    /// Whether signature confirmation uses websocket notifications
    pub use_push_confirmation: bool,
}

impl RpcProfile {
    /// Free/public endpoint tier
    pub fn public() -> Self {
        Self {
            kind: ProfileKind::Public,
            call_interval_ms: 250,
            max_concurrent_requests: 2,
            retry_backoff_ms: 1_000,
            confirmation_timeout_ms: 60_000,
            use_push_confirmation: false,
        }
    }

    /// Paid provider tier
    pub fn premium() -> Self {
        Self {
            kind: ProfileKind::Premium,
            call_interval_ms: 50,
            max_concurrent_requests: 10,
            retry_backoff_ms: 500,
            confirmation_timeout_ms: 30_000,
            use_push_confirmation: true,
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Public => Self::public(),
            ProfileKind::Premium => Self::premium(),
        }
    }

    /// Resolve the active profile: an explicit override wins over URL detection
    pub fn select(url: &str, explicit: Option<ProfileKind>) -> Self {
        Self::for_kind(explicit.unwrap_or_else(|| ProfileKind::for_url(url)))
    }

    pub fn call_interval(&self) -> Duration {
        Duration::from_millis(self.call_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_requests == 0 {
            return Err("max_concurrent_requests must be > 0".to_string());
        }
        if self.confirmation_timeout_ms == 0 {
            return Err("confirmation_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_detection_from_url() {
        assert_eq!(
            ProfileKind::for_url("https://api.mainnet-beta.solana.com"),
            ProfileKind::Public
        );
        assert_eq!(
            ProfileKind::for_url("https://mainnet.helius-rpc.com/?api-key=abc"),
            ProfileKind::Premium
        );
    }

    #[test]
    fn test_explicit_profile_wins() {
        let profile = RpcProfile::select(
            "https://api.devnet.solana.com",
            Some(ProfileKind::Premium),
        );
        assert_eq!(profile, RpcProfile::premium());
    }

    #[test]
    fn test_canonical_profiles() {
        let public = RpcProfile::public();
        assert!(!public.use_push_confirmation);
        assert!(public.call_interval_ms > RpcProfile::premium().call_interval_ms);
        assert!(public.validate().is_ok());
        assert_eq!("free".parse::<ProfileKind>(), Ok(ProfileKind::Public));
        assert!("gold".parse::<ProfileKind>().is_err());
    }
}
