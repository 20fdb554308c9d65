//! Endpoint and credential settings for the concrete providers.
//!
//! Defaults point at the public free tiers. The server's config loader
//! overrides individual fields from the environment.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::models::Chain;

/// Default HTTP request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URL and optional key for one Etherscan-family explorer.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExplorerEndpoint {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ExplorerEndpoint {
    fn keyless(url: &str) -> Self {
        Self {
            url: url.to_string(),
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub coingecko_url: String,
    pub coincap_url: String,
    pub dexscreener_url: String,
    pub fear_greed_url: String,
    pub defillama_url: String,
    pub defillama_yields_url: String,
    pub defillama_stablecoins_url: String,
    /// Explorers with a gas oracle, keyed by chain
    pub explorers: HashMap<Chain, ExplorerEndpoint>,
    /// Preferred RPC endpoint per chain; PublicNode is always tried after it
    pub rpc_urls: HashMap<Chain, String>,
    #[serde(skip)]
    pub http_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let explorers = HashMap::from([
            (
                Chain::Ethereum,
                ExplorerEndpoint::keyless("https://api.etherscan.io/api"),
            ),
            (
                Chain::Arbitrum,
                ExplorerEndpoint::keyless("https://api.arbiscan.io/api"),
            ),
            (
                Chain::Base,
                ExplorerEndpoint::keyless("https://api.basescan.org/api"),
            ),
        ]);

        Self {
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            coincap_url: "https://api.coincap.io/v2".to_string(),
            dexscreener_url: "https://api.dexscreener.com".to_string(),
            fear_greed_url: "https://api.alternative.me/fng".to_string(),
            defillama_url: "https://api.llama.fi".to_string(),
            defillama_yields_url: "https://yields.llama.fi".to_string(),
            defillama_stablecoins_url: "https://stablecoins.llama.fi".to_string(),
            explorers,
            rpc_urls: HashMap::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ProviderSettings {
    /// Set the API key of an already configured explorer.
    pub fn set_explorer_key(&mut self, chain: Chain, api_key: impl Into<String>) {
        let api_key = api_key.into();
        if let Some(endpoint) = self.explorers.get_mut(&chain) {
            endpoint.api_key = (!api_key.trim().is_empty()).then_some(api_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_gas_oracle_chains() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.explorers.len(), 3);
        assert!(settings.explorers[&Chain::Ethereum].api_key.is_none());
        assert!(!settings.explorers.contains_key(&Chain::Polygon));
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_blank_explorer_key_stays_unset() {
        let mut settings = ProviderSettings::default();
        settings.set_explorer_key(Chain::Base, "  ");
        assert!(settings.explorers[&Chain::Base].api_key.is_none());
        settings.set_explorer_key(Chain::Base, "KEY");
        assert_eq!(settings.explorers[&Chain::Base].api_key.as_deref(), Some("KEY"));
        // Chains without an explorer are ignored
        settings.set_explorer_key(Chain::Bsc, "KEY");
        assert!(!settings.explorers.contains_key(&Chain::Bsc));
    }
}
