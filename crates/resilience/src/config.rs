//! Configuration consumed by the resilience layer.
//!
//! The core never reads the environment. A loader (the server's `Config`)
//! builds these structs and hands them to the constructors.

use std::time::Duration;

use serde::Deserialize;

/// Default maximum number of cache entries before eviction.
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default window during which expired entries may still be served.
const DEFAULT_STALE_MAX_AGE: Duration = Duration::from_secs(300);

/// Default per-call provider timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache sizing. Stale tolerance lives in [`FallbackPolicy`], the only reader.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries held at once.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Freshness per data kind.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    #[serde(with = "secs")]
    pub prices: Duration,
    /// Upper bound for prices sourced from DEX pairs.
    #[serde(with = "secs")]
    pub dex_prices: Duration,
    #[serde(with = "secs")]
    pub market_overview: Duration,
    #[serde(with = "secs")]
    pub trending: Duration,
    #[serde(with = "secs")]
    pub fear_greed: Duration,
    #[serde(with = "secs")]
    pub gas: Duration,
    #[serde(with = "secs")]
    pub defi_yields: Duration,
    #[serde(with = "secs")]
    pub protocol_tvl: Duration,
    #[serde(with = "secs")]
    pub protocol_fees: Duration,
    #[serde(with = "secs")]
    pub stablecoins: Duration,
    #[serde(with = "secs")]
    pub wallet_balance: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            prices: Duration::from_secs(30),
            dex_prices: Duration::from_secs(15),
            market_overview: Duration::from_secs(60),
            trending: Duration::from_secs(300),
            fear_greed: Duration::from_secs(3600),
            gas: Duration::from_secs(15),
            defi_yields: Duration::from_secs(300),
            protocol_tvl: Duration::from_secs(600),
            protocol_fees: Duration::from_secs(600),
            stablecoins: Duration::from_secs(600),
            wallet_balance: Duration::from_secs(120),
        }
    }
}

/// Sliding-window quota for one provider.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls allowed inside one window.
    pub max_calls: u32,
    /// Length of the sliding window.
    #[serde(with = "secs")]
    pub window: Duration,
}

impl RateLimitConfig {
    /// Quota expressed as calls per minute.
    pub fn per_minute(max_calls: u32) -> Self {
        Self {
            max_calls,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Orchestrator-wide fallback behaviour.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    /// Maximum age of data served when every provider failed.
    #[serde(with = "secs")]
    pub stale_max_age: Duration,
    /// Upper bound on a single provider call.
    #[serde(with = "secs")]
    pub call_timeout: Duration,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            stale_max_age: DEFAULT_STALE_MAX_AGE,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Durations are written as (fractional) seconds in config files.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(format!(
                "expected a non-negative, representable number of seconds, got {secs}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_free_tier_settings() {
        let cache = CacheConfig::default();
        assert_eq!(cache.max_entries, 10_000);
        assert_eq!(FallbackPolicy::default().stale_max_age, Duration::from_secs(300));

        let ttl = TtlConfig::default();
        assert_eq!(ttl.prices, Duration::from_secs(30));
        assert_eq!(ttl.gas, Duration::from_secs(15));
        assert_eq!(ttl.fear_greed, Duration::from_secs(3600));
        assert_eq!(ttl.defi_yields, Duration::from_secs(300));
        assert_eq!(ttl.wallet_balance, Duration::from_secs(120));
    }

    #[test]
    fn test_deserialize_partial_config_uses_defaults() {
        let ttl: TtlConfig = serde_json::from_str(r#"{"gas": 5, "prices": 12.5}"#).unwrap();
        assert_eq!(ttl.gas, Duration::from_secs(5));
        assert_eq!(ttl.prices, Duration::from_millis(12_500));
        assert_eq!(ttl.trending, Duration::from_secs(300));

        let limit: RateLimitConfig = serde_json::from_str(r#"{"max_calls": 24}"#).unwrap();
        assert_eq!(limit.max_calls, 24);
        assert_eq!(limit.window, Duration::from_secs(60));
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let result: Result<FallbackPolicy, _> = serde_json::from_str(r#"{"call_timeout": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unrepresentable_seconds_rejected() {
        let result: Result<TtlConfig, _> = serde_json::from_str(r#"{"gas": 1e20}"#);
        assert!(result.is_err());

        let result: Result<RateLimitConfig, _> = serde_json::from_str(r#"{"window": 1e300}"#);
        assert!(result.is_err());
    }
}
