//! JSON-RPC provider: gas prices (`eth_gasPrice`) and native balances
//! (`eth_getBalance`).
//!
//! Each chain has an ordered endpoint list: the configured URL (typically a
//! keyed Alchemy endpoint) followed by the keyless PublicNode endpoint. The
//! node only reports one gas price, so slow and fast are derived from it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{FailureKind, ProviderFailure, ProviderId};
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::models::{round2, Chain, GasPrice, WalletBalance};
use crate::provider::http::{build_client, send_json};
use crate::provider::{BalanceOracle, GasOracle};

/// Provider ID constant
pub const PROVIDER_ID: &str = "rpc";

const SLOW_MULTIPLIER: f64 = 0.8;
const FAST_MULTIPLIER: f64 = 1.3;

/// Every supported chain's gas token has 18 decimals.
const WEI_PER_NATIVE: f64 = 1e18;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

pub struct RpcProvider {
    client: Client,
    endpoints: HashMap<Chain, Vec<String>>,
}

impl RpcProvider {
    /// `configured` holds the preferred URL per chain; every chain also gets
    /// its PublicNode endpoint as the last resort.
    pub fn new(configured: &HashMap<Chain, String>, timeout: Duration) -> Self {
        let endpoints = Chain::ALL
            .into_iter()
            .map(|chain| {
                let public = chain.public_rpc_url().to_string();
                let mut urls: Vec<String> = configured
                    .get(&chain)
                    .filter(|url| !url.trim().is_empty())
                    .cloned()
                    .into_iter()
                    .collect();
                if !urls.contains(&public) {
                    urls.push(public);
                }
                (chain, urls)
            })
            .collect();

        Self {
            client: build_client(timeout),
            endpoints,
        }
    }

    pub fn endpoints(&self, chain: Chain) -> &[String] {
        self.endpoints.get(&chain).map(Vec::as_slice).unwrap_or(&[])
    }

    async fn call(
        &self,
        url: &str,
        chain: Chain,
        method: &str,
        params: Value,
    ) -> Result<String, ProviderFailure> {
        let payload = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
        let response: RpcResponse =
            send_json(PROVIDER_ID, self.client.post(url).json(&payload)).await?;

        if let Some(error) = response.error {
            return Err(ProviderFailure::new(
                PROVIDER_ID,
                FailureKind::NoData,
                format!("RPC error on {}: {}", chain, error),
            ));
        }
        response
            .result
            .ok_or_else(|| ProviderFailure::no_data(PROVIDER_ID, format!("Empty RPC result on {}", chain)))
    }

    /// Run `method` against each endpoint for `chain` until one answers.
    async fn call_any(
        &self,
        chain: Chain,
        method: &str,
        params: Value,
    ) -> Result<String, ProviderFailure> {
        let mut last_failure = None;

        for url in self.endpoints(chain) {
            match self.call(url, chain, method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(failure) => {
                    warn!("RPC {} failed for {}: {}", method, chain, failure.message);
                    last_failure = Some(failure);
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| {
            ProviderFailure::unsupported(PROVIDER_ID, format!("No RPC endpoint for {}", chain))
        }))
    }
}

/// Parse a `0x`-prefixed hex quantity.
fn hex_quantity(hex: &str) -> Result<u128, ProviderFailure> {
    let digits = hex.trim().trim_start_matches("0x");
    let digits = if digits.is_empty() { "0" } else { digits };
    u128::from_str_radix(digits, 16)
        .map_err(|_| ProviderFailure::decode(PROVIDER_ID, format!("Invalid hex quantity: {}", hex)))
}

fn hex_wei_to_gwei(hex: &str) -> Result<f64, ProviderFailure> {
    Ok(hex_quantity(hex)? as f64 / 1e9)
}

fn hex_wei_to_native(hex: &str) -> Result<f64, ProviderFailure> {
    Ok(hex_quantity(hex)? as f64 / WEI_PER_NATIVE)
}

fn gas_tiers(chain: Chain, standard_gwei: f64) -> GasPrice {
    GasPrice {
        chain,
        slow_gwei: round2(standard_gwei * SLOW_MULTIPLIER),
        standard_gwei: round2(standard_gwei),
        fast_gwei: round2(standard_gwei * FAST_MULTIPLIER),
        source: PROVIDER_ID.to_string(),
    }
}

#[async_trait]
impl GasOracle for RpcProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn gas_price(&self, chain: Chain) -> Result<GasPrice, ProviderFailure> {
        let hex = self.call_any(chain, "eth_gasPrice", json!([])).await?;
        hex_wei_to_gwei(&hex).map(|gwei| gas_tiers(chain, gwei))
    }
}

#[async_trait]
impl BalanceOracle for RpcProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn native_balance(
        &self,
        chain: Chain,
        address: &str,
    ) -> Result<WalletBalance, ProviderFailure> {
        let hex = self
            .call_any(chain, "eth_getBalance", json!([address, "latest"]))
            .await?;
        Ok(WalletBalance {
            address: address.to_string(),
            chain,
            balance_native: hex_wei_to_native(&hex)?,
            balance_usd: None,
            source: PROVIDER_ID.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_wei_to_gwei() {
        // 25 gwei
        assert_eq!(hex_wei_to_gwei("0x5d21dba00").unwrap(), 25.0);
        assert_eq!(hex_wei_to_gwei("0x0").unwrap(), 0.0);
        assert_eq!(hex_wei_to_gwei("0x").unwrap(), 0.0);
        assert_eq!(
            hex_wei_to_gwei("0xzz").unwrap_err().kind,
            FailureKind::Decode
        );
    }

    #[test]
    fn test_hex_wei_to_native() {
        // 1.5 ETH
        assert_eq!(hex_wei_to_native("0x14d1120d7b160000").unwrap(), 1.5);
        assert_eq!(hex_wei_to_native("0x0").unwrap(), 0.0);
    }

    #[test]
    fn test_gas_tiers_derived_from_standard() {
        let gas = gas_tiers(Chain::Base, 10.0);
        assert_eq!(gas.slow_gwei, 8.0);
        assert_eq!(gas.standard_gwei, 10.0);
        assert_eq!(gas.fast_gwei, 13.0);
        assert_eq!(gas.chain, Chain::Base);

        let tiny = gas_tiers(Chain::Arbitrum, 0.012345);
        assert_eq!(tiny.standard_gwei, 0.01);
        assert_eq!(tiny.slow_gwei, 0.01);
        assert_eq!(tiny.fast_gwei, 0.02);
    }

    #[test]
    fn test_endpoints_put_configured_url_first() {
        let configured = HashMap::from([
            (Chain::Ethereum, "https://eth-mainnet.example/v2/key".to_string()),
            (Chain::Base, Chain::Base.public_rpc_url().to_string()),
            (Chain::Bsc, "  ".to_string()),
        ]);
        let provider = RpcProvider::new(&configured, Duration::from_secs(5));

        assert_eq!(
            provider.endpoints(Chain::Ethereum),
            &[
                "https://eth-mainnet.example/v2/key".to_string(),
                "https://ethereum-rpc.publicnode.com".to_string()
            ]
        );
        assert_eq!(provider.endpoints(Chain::Base).len(), 1);
        assert_eq!(provider.endpoints(Chain::Bsc), &[Chain::Bsc.public_rpc_url().to_string()]);
    }
}
