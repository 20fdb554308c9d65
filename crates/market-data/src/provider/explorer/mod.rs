//! Etherscan-family gas oracle (Etherscan, Arbiscan, Basescan).
//!
//! All three explorers share one API shape. A free API key is required per
//! explorer; a chain without an explorer or without a key fails before any
//! request is sent so the RPC fallback can take over.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{FailureKind, ProviderFailure, ProviderId};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExplorerEndpoint;
use crate::models::{Chain, GasPrice};
use crate::provider::http::{build_client, send_json};
use crate::provider::GasOracle;

/// Provider ID constant
pub const PROVIDER_ID: &str = "explorer";

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct GasOracleResult {
    #[serde(rename = "SafeGasPrice")]
    safe: String,
    #[serde(rename = "ProposeGasPrice")]
    propose: String,
    #[serde(rename = "FastGasPrice")]
    fast: String,
}

pub struct ExplorerGasOracle {
    client: Client,
    endpoints: HashMap<Chain, ExplorerEndpoint>,
}

impl ExplorerGasOracle {
    pub fn new(endpoints: HashMap<Chain, ExplorerEndpoint>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            endpoints,
        }
    }

    /// Endpoint and key for `chain`, or the failure explaining why there is none.
    fn endpoint(&self, chain: Chain) -> Result<(&str, &str), ProviderFailure> {
        let endpoint = self.endpoints.get(&chain).ok_or_else(|| {
            let mut supported: Vec<_> = self.endpoints.keys().map(Chain::as_str).collect();
            supported.sort_unstable();
            ProviderFailure::unsupported(
                PROVIDER_ID,
                format!(
                    "Unsupported chain: {}. Supported: {}",
                    chain,
                    supported.join(", ")
                ),
            )
        })?;

        match endpoint.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok((endpoint.url.as_str(), key)),
            _ => Err(ProviderFailure::config(
                PROVIDER_ID,
                format!("No API key configured for {}", chain),
            )),
        }
    }
}

fn parse_gas_oracle(chain: Chain, response: ExplorerResponse) -> Result<GasPrice, ProviderFailure> {
    if response.status.as_deref() == Some("0") {
        let detail = match &response.result {
            Value::String(text) => text.clone(),
            _ => response.message.unwrap_or_else(|| "?".to_string()),
        };
        let lowered = detail.to_lowercase();
        let kind = if lowered.contains("rate limit") {
            FailureKind::RateLimited
        } else if lowered.contains("api key") {
            FailureKind::Config
        } else {
            FailureKind::NoData
        };
        return Err(ProviderFailure::new(
            PROVIDER_ID,
            kind,
            format!("API error: {}", detail),
        ));
    }

    if !response.result.is_object() {
        return Err(ProviderFailure::no_data(PROVIDER_ID, "Gas oracle returned no result"));
    }

    let result: GasOracleResult = serde_json::from_value(response.result)
        .map_err(|e| ProviderFailure::decode(PROVIDER_ID, format!("Invalid gas oracle: {}", e)))?;

    let gwei = |field: &str, value: &str| {
        value.trim().parse::<f64>().map_err(|_| {
            ProviderFailure::decode(PROVIDER_ID, format!("Invalid {}: {}", field, value))
        })
    };

    Ok(GasPrice {
        chain,
        slow_gwei: gwei("SafeGasPrice", &result.safe)?,
        standard_gwei: gwei("ProposeGasPrice", &result.propose)?,
        fast_gwei: gwei("FastGasPrice", &result.fast)?,
        source: PROVIDER_ID.to_string(),
    })
}

#[async_trait]
impl GasOracle for ExplorerGasOracle {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    fn check(&self, chain: Chain) -> Result<(), ProviderFailure> {
        self.endpoint(chain).map(|_| ())
    }

    async fn gas_price(&self, chain: Chain) -> Result<GasPrice, ProviderFailure> {
        let (url, api_key) = self.endpoint(chain)?;
        let request = self.client.get(url).query(&[
            ("module", "gastracker"),
            ("action", "gasoracle"),
            ("apikey", api_key),
        ]);
        let response: ExplorerResponse = send_json(PROVIDER_ID, request).await?;
        parse_gas_oracle(chain, response)
    }
}
