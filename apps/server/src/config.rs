use std::{collections::HashMap, net::SocketAddr, str::FromStr, time::Duration};

use chainfeed_market_data::{Chain, ProviderSettings};
use chainfeed_resilience::{CacheConfig, FallbackPolicy, RateLimitConfig, TtlConfig};

/// Per-minute quotas applied when no override is set.
const DEFAULT_RATE_LIMITS: [(&str, u32); 7] = [
    ("coingecko", 24),
    ("coincap", 200),
    ("dexscreener", 50),
    ("explorer", 80),
    ("rpc", 300),
    ("fear_greed", 30),
    ("defillama", 200),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_format: LogFormat,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub cache: CacheConfig,
    pub ttls: TtlConfig,
    pub rate_limits: HashMap<String, RateLimitConfig>,
    pub policy: FallbackPolicy,
    pub providers: ProviderSettings,
    /// Problems found while reading the environment. Logged once tracing is up.
    pub warnings: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader {
            lookup,
            warnings: Vec::new(),
        };

        let listen_addr = env.parse("CHAINFEED_LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)));
        let log_format = match env.string("CHAINFEED_LOG_FORMAT").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let cors_allow = env
            .string("CHAINFEED_CORS_ALLOW_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_string()]);
        let request_timeout = Duration::from_millis(env.parse("CHAINFEED_REQUEST_TIMEOUT_MS", 30_000u64));

        let cache = CacheConfig {
            max_entries: env.parse("CHAINFEED_CACHE_MAX_ENTRIES", CacheConfig::default().max_entries),
        };

        let defaults = TtlConfig::default();
        let ttls = TtlConfig {
            prices: env.secs("CHAINFEED_TTL_PRICES", defaults.prices),
            dex_prices: env.secs("CHAINFEED_TTL_DEX_PRICES", defaults.dex_prices),
            market_overview: env.secs("CHAINFEED_TTL_MARKET_OVERVIEW", defaults.market_overview),
            trending: env.secs("CHAINFEED_TTL_TRENDING", defaults.trending),
            fear_greed: env.secs("CHAINFEED_TTL_FEAR_GREED", defaults.fear_greed),
            gas: env.secs("CHAINFEED_TTL_GAS", defaults.gas),
            defi_yields: env.secs("CHAINFEED_TTL_DEFI_YIELDS", defaults.defi_yields),
            protocol_tvl: env.secs("CHAINFEED_TTL_PROTOCOL_TVL", defaults.protocol_tvl),
            protocol_fees: env.secs("CHAINFEED_TTL_PROTOCOL_FEES", defaults.protocol_fees),
            stablecoins: env.secs("CHAINFEED_TTL_STABLECOINS", defaults.stablecoins),
            wallet_balance: env.secs("CHAINFEED_TTL_WALLET_BALANCE", defaults.wallet_balance),
        };

        let rate_limits = DEFAULT_RATE_LIMITS
            .iter()
            .map(|(provider, per_minute)| {
                let key = format!("CHAINFEED_RATE_LIMIT_{}", provider.to_uppercase());
                let max_calls = env.parse(&key, *per_minute);
                (provider.to_string(), RateLimitConfig::per_minute(max_calls))
            })
            .collect();

        let mut providers = ProviderSettings::default();
        providers.http_timeout = env.secs("CHAINFEED_HTTP_TIMEOUT", providers.http_timeout);
        for (var, field) in [
            ("CHAINFEED_COINGECKO_URL", &mut providers.coingecko_url),
            ("CHAINFEED_COINCAP_URL", &mut providers.coincap_url),
            ("CHAINFEED_DEXSCREENER_URL", &mut providers.dexscreener_url),
            ("CHAINFEED_FEAR_GREED_URL", &mut providers.fear_greed_url),
            ("CHAINFEED_DEFILLAMA_URL", &mut providers.defillama_url),
            ("CHAINFEED_DEFILLAMA_YIELDS_URL", &mut providers.defillama_yields_url),
            ("CHAINFEED_DEFILLAMA_STABLECOINS_URL", &mut providers.defillama_stablecoins_url),
        ] {
            if let Some(url) = env.string(var) {
                *field = url;
            }
        }
        for (chain, var) in [
            (Chain::Ethereum, "CHAINFEED_ETHERSCAN_API_KEY"),
            (Chain::Arbitrum, "CHAINFEED_ARBISCAN_API_KEY"),
            (Chain::Base, "CHAINFEED_BASESCAN_API_KEY"),
        ] {
            if let Some(key) = env.string(var) {
                providers.set_explorer_key(chain, key);
            }
        }
        for chain in Chain::ALL {
            let var = format!("CHAINFEED_RPC_URL_{}", chain.as_str().to_uppercase());
            if let Some(url) = env.string(&var) {
                providers.rpc_urls.insert(chain, url);
            }
        }

        let policy = FallbackPolicy {
            stale_max_age: env.secs(
                "CHAINFEED_CACHE_STALE_MAX_AGE",
                FallbackPolicy::default().stale_max_age,
            ),
            call_timeout: providers.http_timeout,
        };

        Self {
            listen_addr,
            log_format,
            cors_allow,
            request_timeout,
            cache,
            ttls,
            rate_limits,
            policy,
            providers,
            warnings: env.warnings,
        }
    }
}

struct EnvReader<F> {
    lookup: F,
    warnings: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank value of `key`, trimmed.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        match self.string(key) {
            Some(raw) => match raw.parse() {
                Ok(value) => value,
                Err(_) => {
                    self.warnings
                        .push(format!("Invalid {key}={raw:?}, using default {default}"));
                    default
                }
            },
            None => default,
        }
    }

    /// Seconds, fractional allowed.
    fn secs(&mut self, key: &str, default: Duration) -> Duration {
        match self.string(key) {
            Some(raw) => match raw.parse::<f64>().map(Duration::try_from_secs_f64) {
                Ok(Ok(value)) => value,
                _ => {
                    self.warnings
                        .push(format!("Invalid {key}={raw:?}, using default {default:?}"));
                    default
                }
            },
            None => default,
        }
    }
}
