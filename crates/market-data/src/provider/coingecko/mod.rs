//! CoinGecko provider (free demo tier, no key required).
//!
//! Serves three tools:
//! - batch spot prices via `/simple/price`
//! - global market aggregates via `/global`
//! - trending coins via `/search/trending`
//!
//! Tickers are translated to CoinGecko's slug ids; anything not in the map
//! is assumed to already be an id (e.g. "bitcoin").

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{BatchSource, ProviderFailure, ProviderId, SingleSource};
use reqwest::Client;
use serde::Deserialize;

use crate::models::{round2, MarketOverview, PriceRecord, TrendingCoin};
use crate::provider::http::{build_client, lenient_f64, send_json};

/// Provider ID constant
pub const PROVIDER_ID: &str = "coingecko";

/// Common tickers mapped to CoinGecko ids.
const TICKER_MAP: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("AVAX", "avalanche-2"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("POL", "matic-network"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("AAVE", "aave"),
    ("ARB", "arbitrum"),
    ("OP", "optimism"),
    ("ATOM", "cosmos"),
    ("NEAR", "near"),
    ("APT", "aptos"),
    ("SUI", "sui"),
    ("FTM", "fantom"),
    ("TRX", "tron"),
    ("SHIB", "shiba-inu"),
    ("LTC", "litecoin"),
    ("BCH", "bitcoin-cash"),
    ("FIL", "filecoin"),
    ("IMX", "immutable-x"),
    ("RENDER", "render-token"),
    ("INJ", "injective-protocol"),
    ("TIA", "celestia"),
    ("SEI", "sei-network"),
    ("STX", "blockstack"),
    ("PEPE", "pepe"),
    ("WIF", "dogwifcoin"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("DAI", "dai"),
    ("STETH", "staked-ether"),
    ("WBTC", "wrapped-bitcoin"),
    ("TON", "the-open-network"),
    ("MKR", "maker"),
    ("CRV", "curve-dao-token"),
    ("LDO", "lido-dao"),
    ("RETH", "rocket-pool-eth"),
];

/// Resolve a ticker or CoinGecko id to a CoinGecko id.
pub fn resolve_id(symbol: &str) -> String {
    let symbol = symbol.trim();
    TICKER_MAP
        .iter()
        .find(|(ticker, _)| ticker.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

/// One entry of the `/simple/price` response.
#[derive(Debug, Deserialize)]
struct SimplePrice {
    #[serde(default, deserialize_with = "lenient_f64")]
    usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    usd_24h_change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    usd_24h_vol: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    usd_market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
    #[serde(default)]
    market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    active_cryptocurrencies: u64,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    data: Option<TrendingItemData>,
}

#[derive(Debug, Deserialize)]
struct TrendingItemData {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: HashMap<String, f64>,
}

/// CoinGecko provider for prices, market overview and trending coins.
///
/// # Example
///
/// ```ignore
/// let provider = CoinGeckoProvider::new("https://api.coingecko.com/api/v3", Duration::from_secs(10));
/// ```
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderFailure> {
        let url = format!("{}{}", self.base_url, path);
        send_json(PROVIDER_ID, self.client.get(url).query(query)).await
    }

    pub async fn fetch_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        let ids: BTreeSet<String> = symbols.iter().map(|s| resolve_id(s)).collect();
        let ids = ids.into_iter().collect::<Vec<_>>().join(",");

        let data: HashMap<String, SimplePrice> = self
            .get(
                "/simple/price",
                &[
                    ("ids", ids.as_str()),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                    ("include_24hr_vol", "true"),
                    ("include_market_cap", "true"),
                ],
            )
            .await?;

        Ok(parse_prices(symbols, &data))
    }

    pub async fn fetch_market_overview(&self) -> Result<MarketOverview, ProviderFailure> {
        let response: GlobalResponse = self.get("/global", &[]).await?;
        Ok(parse_overview(response.data))
    }

    pub async fn fetch_trending(&self) -> Result<Vec<TrendingCoin>, ProviderFailure> {
        let response: TrendingResponse = self.get("/search/trending", &[]).await?;
        Ok(parse_trending(response))
    }
}

/// Map each requested symbol to the record for its id. Ids without a USD
/// price are left unresolved.
fn parse_prices(
    symbols: &[String],
    data: &HashMap<String, SimplePrice>,
) -> HashMap<String, PriceRecord> {
    symbols
        .iter()
        .filter_map(|symbol| {
            let id = resolve_id(symbol);
            let info = data.get(&id)?;
            let price = info.usd?;
            let mut record = PriceRecord::new(symbol.to_uppercase(), id, price, PROVIDER_ID);
            record.change_24h = info.usd_24h_change;
            record.volume_24h = info.usd_24h_vol;
            record.market_cap = info.usd_market_cap;
            Some((symbol.clone(), record))
        })
        .collect()
}

fn parse_overview(data: GlobalData) -> MarketOverview {
    let usd = |map: &HashMap<String, f64>, key: &str| map.get(key).copied().unwrap_or(0.0);
    MarketOverview {
        total_market_cap_usd: usd(&data.total_market_cap, "usd"),
        total_volume_24h_usd: usd(&data.total_volume, "usd"),
        btc_dominance: round2(usd(&data.market_cap_percentage, "btc")),
        eth_dominance: round2(usd(&data.market_cap_percentage, "eth")),
        active_cryptocurrencies: data.active_cryptocurrencies,
        source: PROVIDER_ID.to_string(),
    }
}

fn parse_trending(response: TrendingResponse) -> Vec<TrendingCoin> {
    response
        .coins
        .into_iter()
        .map(|entry| {
            let item = entry.item;
            let (price_usd, change_24h) = match item.data {
                Some(data) => (data.price, data.price_change_percentage_24h.get("usd").copied()),
                None => (None, None),
            };
            TrendingCoin {
                symbol: item.symbol.to_uppercase(),
                name: item.name,
                market_cap_rank: item.market_cap_rank,
                price_usd,
                change_24h,
                source: PROVIDER_ID.to_string(),
            }
        })
        .collect()
}

#[async_trait]
impl BatchSource<PriceRecord> for CoinGeckoProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        self.fetch_prices(keys).await
    }
}

#[async_trait]
impl SingleSource<MarketOverview> for CoinGeckoProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn fetch(&self) -> Result<MarketOverview, ProviderFailure> {
        self.fetch_market_overview().await
    }
}

#[async_trait]
impl SingleSource<Vec<TrendingCoin>> for CoinGeckoProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn fetch(&self) -> Result<Vec<TrendingCoin>, ProviderFailure> {
        self.fetch_trending().await
    }
}
