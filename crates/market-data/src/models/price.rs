use serde::{Deserialize, Serialize};

/// Spot price for one requested symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Symbol as requested, upper-cased
    pub symbol: String,

    /// Provider's name or id for the asset
    pub name: String,

    pub price_usd: f64,

    /// 24h change in percent
    #[serde(default)]
    pub change_24h: Option<f64>,

    #[serde(default)]
    pub volume_24h: Option<f64>,

    #[serde(default)]
    pub market_cap: Option<f64>,

    /// Provider that answered (coingecko, coincap, dexscreener)
    pub source: String,

    // DEX-only fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity_usd: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_url: Option<String>,
}

impl PriceRecord {
    /// Create a record with the required fields; optional metrics start empty.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price_usd: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            price_usd,
            change_24h: None,
            volume_24h: None,
            market_cap: None,
            source: source.into(),
            chain: None,
            dex: None,
            liquidity_usd: None,
            pair_address: None,
            pair_url: None,
        }
    }
}
