//! CoinCap provider, a keyless fallback for spot prices.
//!
//! CoinCap has no batch endpoint: each symbol is one `/assets/{id}` request.
//! Symbols that fail individually are skipped; the call only fails when no
//! symbol could be priced. Through the orchestrator each call carries a
//! single symbol.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{BatchSource, ProviderFailure, ProviderId};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

use crate::models::PriceRecord;
use crate::provider::http::{build_client, lenient_f64, send_json};

/// Provider ID constant
pub const PROVIDER_ID: &str = "coincap";

/// CoinCap's own id scheme (lowercase, hyphenated).
const TICKER_MAP: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("BNB", "binance-coin"),
    ("XRP", "xrp"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("AVAX", "avalanche"),
    ("DOT", "polkadot"),
    ("MATIC", "polygon"),
    ("POL", "polygon"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("AAVE", "aave"),
    ("ATOM", "cosmos"),
    ("NEAR", "near-protocol"),
    ("LTC", "litecoin"),
    ("BCH", "bitcoin-cash"),
    ("TRX", "tron"),
    ("SHIB", "shiba-inu"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("DAI", "multi-collateral-dai"),
    ("TON", "toncoin"),
];

pub fn resolve_id(symbol: &str) -> String {
    let symbol = symbol.trim();
    TICKER_MAP
        .iter()
        .find(|(ticker, _)| ticker.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    data: Asset,
}

/// CoinCap sends every number as a string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Asset {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_usd: Option<f64>,
    #[serde(rename = "changePercent24Hr", default, deserialize_with = "lenient_f64")]
    change_24h: Option<f64>,
    #[serde(rename = "volumeUsd24Hr", default, deserialize_with = "lenient_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap_usd: Option<f64>,
}

pub struct CoinCapProvider {
    client: Client,
    base_url: String,
}

impl CoinCapProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_asset(&self, symbol: &str) -> Result<PriceRecord, ProviderFailure> {
        let id = resolve_id(symbol);
        let url = format!("{}/assets/{}", self.base_url, id);
        let response: AssetResponse = send_json(PROVIDER_ID, self.client.get(url)).await?;
        to_record(symbol, &id, response.data)
    }

    pub async fn fetch_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        let mut records = HashMap::new();
        let mut last_failure = None;

        for symbol in symbols {
            match self.fetch_asset(symbol).await {
                Ok(record) => {
                    records.insert(symbol.clone(), record);
                }
                Err(failure) => {
                    warn!("CoinCap failed for {}, skipping: {}", symbol, failure.message);
                    last_failure = Some(failure);
                }
            }
        }

        if records.is_empty() {
            let detail = last_failure
                .map(|f| format!(" (last error: {})", f.message))
                .unwrap_or_default();
            return Err(ProviderFailure::no_data(
                PROVIDER_ID,
                format!("No prices returned{}", detail),
            ));
        }

        debug!("CoinCap priced {}/{} symbols", records.len(), symbols.len());
        Ok(records)
    }
}

fn to_record(symbol: &str, id: &str, asset: Asset) -> Result<PriceRecord, ProviderFailure> {
    let price = asset
        .price_usd
        .ok_or_else(|| ProviderFailure::no_data(PROVIDER_ID, format!("No price for {}", id)))?;

    let mut record = PriceRecord::new(
        symbol.to_uppercase(),
        asset.name.unwrap_or_else(|| id.to_string()),
        price,
        PROVIDER_ID,
    );
    record.change_24h = asset.change_24h;
    record.volume_24h = asset.volume_24h;
    record.market_cap = asset.market_cap_usd;
    Ok(record)
}

#[async_trait]
impl BatchSource<PriceRecord> for CoinCapProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    /// One request per symbol; the orchestrator paces each.
    fn per_key_calls(&self) -> bool {
        true
    }

    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        self.fetch_prices(keys).await
    }
}

#[cfg(test)]
mod tests {
    use chainfeed_resilience::FailureKind;

    use super::*;

    #[test]
    fn test_resolve_id_uses_coincap_scheme() {
        assert_eq!(resolve_id("BNB"), "binance-coin");
        assert_eq!(resolve_id("matic"), "polygon");
        assert_eq!(resolve_id("Render-Token"), "render-token");
    }

    #[test]
    fn test_string_fields_parsed() {
        let response: AssetResponse = serde_json::from_str(
            r#"{"data": {
                "id": "bitcoin", "name": "Bitcoin", "priceUsd": "64123.456",
                "changePercent24Hr": "-0.75", "volumeUsd24Hr": null, "marketCapUsd": "1260000000000"
            }}"#,
        )
        .unwrap();

        let record = to_record("btc", "bitcoin", response.data).unwrap();
        assert_eq!(record.symbol, "BTC");
        assert_eq!(record.name, "Bitcoin");
        assert_eq!(record.price_usd, 64123.456);
        assert_eq!(record.change_24h, Some(-0.75));
        assert_eq!(record.volume_24h, None);
        assert_eq!(record.market_cap, Some(1.26e12));
        assert_eq!(record.source, "coincap");
    }

    #[test]
    fn test_missing_price_is_no_data() {
        let response: AssetResponse =
            serde_json::from_str(r#"{"data": {"id": "ghost"}}"#).unwrap();
        let err = to_record("GHOST", "ghost", response.data).unwrap_err();
        assert_eq!(err.kind, FailureKind::NoData);
    }
}
