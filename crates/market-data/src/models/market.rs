use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Global crypto market aggregates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_market_cap_usd: f64,
    pub total_volume_24h_usd: f64,
    /// BTC share of total market cap, in percent (2dp)
    pub btc_dominance: f64,
    /// ETH share of total market cap, in percent (2dp)
    pub eth_dominance: f64,
    pub active_cryptocurrencies: u64,
    pub source: String,
}

/// A coin trending in the last 24 hours.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub change_24h: Option<f64>,
    pub source: String,
}

/// Crypto Fear & Greed index reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FearGreed {
    /// 0 (extreme fear) to 100 (extreme greed)
    pub value: u8,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}
