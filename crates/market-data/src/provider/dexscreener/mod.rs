//! DexScreener provider (keyless), the last resort for low-cap DEX tokens.
//!
//! Each symbol is searched across all chains; the pair whose base token
//! matches the symbol and has the deepest USD liquidity wins. DEX prices move
//! faster than aggregator prices, so this source caps the batch TTL.

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
pub const PROVIDER_ID: &str = "dexscreener";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    chain_id: Option<String>,
    #[serde(default)]
    dex_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    pair_address: Option<String>,
    base_token: BaseToken,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_usd: Option<f64>,
    #[serde(default)]
    price_change: Option<Window>,
    #[serde(default)]
    volume: Option<Window>,
    #[serde(default)]
    liquidity: Option<Liquidity>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fdv: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct BaseToken {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Window {
    #[serde(default, deserialize_with = "lenient_f64")]
    h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct Liquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    usd: Option<f64>,
}

impl Pair {
    fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }
}

pub struct DexScreenerProvider {
    client: Client,
    base_url: String,
    ttl: Duration,
}

impl DexScreenerProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration, ttl: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
        }
    }

    async fn search(&self, symbol: &str) -> Result<Option<PriceRecord>, ProviderFailure> {
        let url = format!("{}/latest/dex/search", self.base_url);
        let response: SearchResponse = send_json(
            PROVIDER_ID,
            self.client.get(url).query(&[("q", symbol.trim())]),
        )
        .await?;

        let pairs = response.pairs.unwrap_or_default();
        Ok(best_pair(&pairs, symbol).map(|pair| to_record(symbol, pair)))
    }

    pub async fn fetch_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        let mut records = HashMap::new();

        for symbol in symbols {
            match self.search(symbol).await {
                Ok(Some(record)) => {
                    records.insert(symbol.clone(), record);
                }
                Ok(None) => debug!("DexScreener: no pair found for {}", symbol),
                Err(failure) => {
                    warn!("DexScreener failed for {}, skipping: {}", symbol, failure.message)
                }
            }
        }

        if records.is_empty() {
            return Err(ProviderFailure::no_data(PROVIDER_ID, "No prices returned"));
        }
        Ok(records)
    }
}

/// Pick the pair for `symbol`: base token symbol must match and a USD price
/// must be present; highest USD liquidity wins, ties keep the first pair seen.
fn best_pair<'a>(pairs: &'a [Pair], symbol: &str) -> Option<&'a Pair> {
    let wanted = symbol.trim();
    pairs
        .iter()
        .filter(|p| p.base_token.symbol.eq_ignore_ascii_case(wanted))
        .filter(|p| p.price_usd.is_some_and(|price| price > 0.0))
        .fold(None, |best: Option<&Pair>, candidate| match best {
            Some(current)
                if candidate.liquidity_usd().unwrap_or(0.0)
                    <= current.liquidity_usd().unwrap_or(0.0) =>
            {
                Some(current)
            }
            _ => Some(candidate),
        })
}

fn to_record(symbol: &str, pair: &Pair) -> PriceRecord {
    let mut record = PriceRecord::new(
        symbol.trim().to_uppercase(),
        pair.base_token
            .name
            .clone()
            .unwrap_or_else(|| symbol.trim().to_string()),
        pair.price_usd.unwrap_or_default(),
        PROVIDER_ID,
    );
    record.change_24h = pair.price_change.as_ref().and_then(|w| w.h24);
    record.volume_24h = pair.volume.as_ref().and_then(|w| w.h24);
    record.market_cap = pair.market_cap.or(pair.fdv);
    record.chain = pair.chain_id.clone();
    record.dex = pair.dex_id.clone();
    record.liquidity_usd = pair.liquidity_usd();
    record.pair_address = pair.pair_address.clone();
    record.pair_url = pair.url.clone();
    record
}

#[async_trait]
impl BatchSource<PriceRecord> for DexScreenerProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    /// One request per symbol; the orchestrator paces each.
    fn per_key_calls(&self) -> bool {
        true
    }

    fn ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }

    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        self.fetch_prices(keys).await
    }
}
