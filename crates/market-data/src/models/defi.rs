use serde::{Deserialize, Serialize};

/// A DeFi yield pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefiYield {
    /// Pool symbol, e.g. "USDC-WETH"
    pub pool: String,
    pub project: String,
    pub chain: String,
    pub tvl_usd: f64,
    /// Total APY in percent (2dp)
    pub apy: f64,
    #[serde(default)]
    pub apy_base: Option<f64>,
    #[serde(default)]
    pub apy_reward: Option<f64>,
    pub stablecoin: bool,
    pub source: String,
}

/// Filters for a yield pool listing.
#[derive(Clone, Debug, PartialEq)]
pub struct YieldQuery {
    /// Chain name as the upstream spells it ("Ethereum", "Arbitrum"); any case.
    pub chain: Option<String>,
    pub min_tvl: f64,
    pub stablecoin_only: bool,
    pub limit: usize,
}

impl Default for YieldQuery {
    fn default() -> Self {
        Self {
            chain: None,
            min_tvl: 0.0,
            stablecoin_only: false,
            limit: 20,
        }
    }
}

/// Total value locked in one protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolTvl {
    pub name: String,
    pub tvl_usd: f64,
    #[serde(default)]
    pub change_1d: Option<f64>,
    #[serde(default)]
    pub change_7d: Option<f64>,
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub source: String,
}

/// Fees and revenue earned by a protocol over the last 24 hours.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFees {
    pub name: String,
    #[serde(default)]
    pub fees_24h: Option<f64>,
    #[serde(default)]
    pub revenue_24h: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    pub source: String,
}

/// Circulating supply and peg of a stablecoin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stablecoin {
    pub name: String,
    pub symbol: String,
    /// e.g. "peggedUSD", "peggedEUR"
    pub peg_type: String,
    pub circulating_usd: f64,
    #[serde(default)]
    pub chains: Vec<String>,
    pub source: String,
}
