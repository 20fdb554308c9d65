//! DefiLlama provider (keyless, generous limits).
//!
//! Three hosts share one provider id and one rate limiter:
//! - `api.llama.fi`: `/protocols`, `/tvl/{slug}`, `/overview/fees`
//! - `yields.llama.fi`: `/pools`
//! - `stablecoins.llama.fi`: `/stablecoins`
//!
//! Every listing is re-sorted largest first; ties keep upstream order.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{ProviderFailure, ProviderId};
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{round2, DefiYield, ProtocolFees, ProtocolTvl, Stablecoin, YieldQuery};
use crate::provider::http::{build_client, lenient_f64, send_json};
use crate::provider::DefiSource;

/// Provider ID constant
pub const PROVIDER_ID: &str = "defillama";

/// `/pools` has been served both bare and wrapped in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoolsResponse {
    Bare(Vec<Pool>),
    Wrapped {
        #[serde(default)]
        data: Vec<Pool>,
    },
}

impl PoolsResponse {
    fn into_pools(self) -> Vec<Pool> {
        match self {
            Self::Bare(pools) | Self::Wrapped { data: pools } => pools,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pool {
    #[serde(default)]
    pool: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    chain: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    tvl_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    apy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    apy_base: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    apy_reward: Option<f64>,
    #[serde(default)]
    stablecoin: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Protocol {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    tvl: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    change_1d: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    change_7d: Option<f64>,
    #[serde(default)]
    chains: Option<Vec<String>>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeesResponse {
    #[serde(default)]
    protocols: Vec<FeeEntry>,
}

#[derive(Debug, Deserialize)]
struct FeeEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "total24h", default, deserialize_with = "lenient_f64")]
    total_24h: Option<f64>,
    #[serde(rename = "revenue24h", default, deserialize_with = "lenient_f64")]
    revenue_24h: Option<f64>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StablecoinsResponse {
    #[serde(default)]
    pegged_assets: Vec<PeggedAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeggedAsset {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    peg_type: Option<String>,
    #[serde(default)]
    circulating: Option<Circulating>,
    #[serde(default)]
    chains: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Circulating {
    #[serde(rename = "peggedUSD", default, deserialize_with = "lenient_f64")]
    pegged_usd: Option<f64>,
}

impl PeggedAsset {
    fn circulating_usd(&self) -> f64 {
        self.circulating
            .as_ref()
            .and_then(|c| c.pegged_usd)
            .unwrap_or(0.0)
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "?".to_string())
}

/// Descending by `key`; `sort_by` is stable, so ties keep their input order.
fn largest_first<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
}

fn parse_yields(pools: Vec<Pool>, query: &YieldQuery) -> Vec<DefiYield> {
    let chain = query.chain.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let mut matching: Vec<Pool> = pools
        .into_iter()
        .filter(|p| p.tvl_usd.unwrap_or(0.0) >= query.min_tvl)
        .filter(|p| match chain {
            Some(wanted) => p
                .chain
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .filter(|p| !query.stablecoin_only || p.stablecoin.unwrap_or(false))
        .filter(|p| p.apy.unwrap_or(0.0) > 0.0)
        .collect();

    largest_first(&mut matching, |p| p.tvl_usd.unwrap_or(0.0));

    matching
        .into_iter()
        .take(query.limit)
        .map(|p| DefiYield {
            pool: or_unknown(p.symbol.or(p.pool)),
            project: or_unknown(p.project),
            chain: or_unknown(p.chain),
            tvl_usd: p.tvl_usd.unwrap_or(0.0),
            apy: round2(p.apy.unwrap_or(0.0)),
            apy_base: p.apy_base,
            apy_reward: p.apy_reward,
            stablecoin: p.stablecoin.unwrap_or(false),
            source: PROVIDER_ID.to_string(),
        })
        .collect()
}

fn parse_protocols(mut protocols: Vec<Protocol>, limit: usize) -> Vec<ProtocolTvl> {
    largest_first(&mut protocols, |p| p.tvl.unwrap_or(0.0));
    protocols
        .into_iter()
        .take(limit)
        .map(|p| ProtocolTvl {
            name: or_unknown(p.name),
            tvl_usd: p.tvl.unwrap_or(0.0),
            change_1d: p.change_1d,
            change_7d: p.change_7d,
            chains: p.chains.unwrap_or_default(),
            category: p.category,
            source: PROVIDER_ID.to_string(),
        })
        .collect()
}

/// `/tvl/{slug}` answers with a bare number.
fn parse_protocol_tvl(slug: &str, body: Value) -> Result<ProtocolTvl, ProviderFailure> {
    let tvl = body.as_f64().filter(|v| v.is_finite()).ok_or_else(|| {
        ProviderFailure::no_data(PROVIDER_ID, format!("Unexpected TVL response for {}", slug))
    })?;

    Ok(ProtocolTvl {
        name: slug.to_string(),
        tvl_usd: tvl,
        change_1d: None,
        change_7d: None,
        chains: Vec::new(),
        category: None,
        source: PROVIDER_ID.to_string(),
    })
}

fn parse_fees(mut entries: Vec<FeeEntry>, limit: usize) -> Vec<ProtocolFees> {
    largest_first(&mut entries, |e| e.total_24h.unwrap_or(0.0));
    entries
        .into_iter()
        .take(limit)
        .map(|e| ProtocolFees {
            name: or_unknown(e.name),
            fees_24h: e.total_24h,
            revenue_24h: e.revenue_24h,
            category: e.category,
            source: PROVIDER_ID.to_string(),
        })
        .collect()
}

fn parse_stablecoins(mut assets: Vec<PeggedAsset>, limit: usize) -> Vec<Stablecoin> {
    largest_first(&mut assets, PeggedAsset::circulating_usd);
    assets
        .into_iter()
        .take(limit)
        .map(|a| Stablecoin {
            circulating_usd: a.circulating_usd(),
            name: or_unknown(a.name),
            symbol: or_unknown(a.symbol),
            peg_type: or_unknown(a.peg_type),
            chains: a.chains.unwrap_or_default(),
            source: PROVIDER_ID.to_string(),
        })
        .collect()
}

fn non_empty<T>(items: Vec<T>, what: &str) -> Result<Vec<T>, ProviderFailure> {
    if items.is_empty() {
        return Err(ProviderFailure::no_data(
            PROVIDER_ID,
            format!("No {} returned", what),
        ));
    }
    Ok(items)
}

pub struct DefiLlamaProvider {
    client: Client,
    base_url: String,
    yields_url: String,
    stablecoins_url: String,
}

impl DefiLlamaProvider {
    pub fn new(
        base_url: impl Into<String>,
        yields_url: impl Into<String>,
        stablecoins_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let trim = |url: String| url.trim_end_matches('/').to_string();
        Self {
            client: build_client(timeout),
            base_url: trim(base_url.into()),
            yields_url: trim(yields_url.into()),
            stablecoins_url: trim(stablecoins_url.into()),
        }
    }
}

#[async_trait]
impl DefiSource for DefiLlamaProvider {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(PROVIDER_ID)
    }

    async fn yields(&self, query: &YieldQuery) -> Result<Vec<DefiYield>, ProviderFailure> {
        let url = format!("{}/pools", self.yields_url);
        let response: PoolsResponse = send_json(PROVIDER_ID, self.client.get(url)).await?;
        let pools = non_empty(response.into_pools(), "pools")?;

        let total = pools.len();
        let yields = parse_yields(pools, query);
        debug!("DefiLlama: {} of {} pools match {:?}", yields.len(), total, query);
        // A filter that matches nothing is an answer, not a failure
        Ok(yields)
    }

    async fn top_protocols(&self, limit: usize) -> Result<Vec<ProtocolTvl>, ProviderFailure> {
        let url = format!("{}/protocols", self.base_url);
        let protocols: Vec<Protocol> = send_json(PROVIDER_ID, self.client.get(url)).await?;
        non_empty(parse_protocols(protocols, limit), "protocols")
    }

    async fn protocol_tvl(&self, slug: &str) -> Result<ProtocolTvl, ProviderFailure> {
        let url = format!("{}/tvl/{}", self.base_url, slug);
        let body: Value = send_json(PROVIDER_ID, self.client.get(url)).await?;
        parse_protocol_tvl(slug, body)
    }

    async fn protocol_fees(&self, limit: usize) -> Result<Vec<ProtocolFees>, ProviderFailure> {
        let url = format!("{}/overview/fees", self.base_url);
        let response: FeesResponse = send_json(
            PROVIDER_ID,
            self.client.get(url).query(&[
                ("excludeTotalDataChart", "true"),
                ("excludeTotalDataChartBreakdown", "true"),
            ]),
        )
        .await?;
        non_empty(parse_fees(response.protocols, limit), "fee data")
    }

    async fn stablecoins(&self, limit: usize) -> Result<Vec<Stablecoin>, ProviderFailure> {
        let url = format!("{}/stablecoins", self.stablecoins_url);
        let response: StablecoinsResponse = send_json(PROVIDER_ID, self.client.get(url)).await?;
        non_empty(parse_stablecoins(response.pegged_assets, limit), "stablecoins")
    }
}

#[cfg(test)]
mod tests {
    use chainfeed_resilience::FailureKind;

    use super::*;

    const POOLS: &str = r#"{"status": "success", "data": [
        {"pool": "p1", "symbol": "STETH", "project": "lido", "chain": "Ethereum",
         "tvlUsd": 30000000000, "apy": 3.1234, "apyBase": 3.1234, "apyReward": null, "stablecoin": false},
        {"pool": "p2", "symbol": "USDC", "project": "aave-v3", "chain": "Arbitrum",
         "tvlUsd": 500000000, "apy": 4.567, "apyBase": 4.0, "apyReward": 0.567, "stablecoin": true},
        {"pool": "p3", "symbol": "USDT", "project": "compound-v3", "chain": "Ethereum",
         "tvlUsd": 900000000, "apy": 5.0, "stablecoin": true},
        {"pool": "p4", "symbol": "DEAD", "project": "rug", "chain": "Ethereum",
         "tvlUsd": 2000000000, "apy": 0, "stablecoin": true},
        {"pool": "p5", "project": "tiny", "chain": "ethereum",
         "tvlUsd": 900000000, "apy": 12.0, "stablecoin": true}
    ]}"#;

    fn pools() -> Vec<Pool> {
        serde_json::from_str::<PoolsResponse>(POOLS).unwrap().into_pools()
    }

    #[test]
    fn test_yields_sorted_by_tvl_with_zero_apy_dropped() {
        let yields = parse_yields(pools(), &YieldQuery::default());
        let names: Vec<_> = yields.iter().map(|y| y.pool.as_str()).collect();
        // Equal TVL keeps upstream order; p4 has no yield
        assert_eq!(names, vec!["STETH", "USDT", "p5", "USDC"]);
        assert_eq!(yields[0].apy, 3.12);
        assert_eq!(yields[3].apy_reward, Some(0.567));
        assert_eq!(yields[0].source, "defillama");
    }

    #[test]
    fn test_yield_filters() {
        let query = YieldQuery {
            chain: Some("ETHEREUM".to_string()),
            min_tvl: 600_000_000.0,
            stablecoin_only: true,
            limit: 1,
        };
        let yields = parse_yields(pools(), &query);
        assert_eq!(yields.len(), 1);
        assert_eq!(yields[0].project, "compound-v3");

        let arbitrum = YieldQuery {
            chain: Some("arbitrum".to_string()),
            ..YieldQuery::default()
        };
        assert_eq!(parse_yields(pools(), &arbitrum)[0].pool, "USDC");
    }

    #[test]
    fn test_bare_pool_list_accepted() {
        let response: PoolsResponse =
            serde_json::from_str(r#"[{"symbol": "X", "tvlUsd": "10", "apy": 1}]"#).unwrap();
        let yields = parse_yields(response.into_pools(), &YieldQuery::default());
        assert_eq!(yields[0].tvl_usd, 10.0);
        assert_eq!(yields[0].chain, "?");
    }

    #[test]
    fn test_protocols_sorted_and_limited() {
        let protocols: Vec<Protocol> = serde_json::from_str(
            r#"[
                {"name": "Uniswap", "tvl": 5000000000, "change_1d": -1.2, "chains": ["Ethereum", "Base"], "category": "Dexes"},
                {"name": "Lido", "tvl": 30000000000, "change_1d": 0.4, "change_7d": 2.0, "chains": ["Ethereum"], "category": "Liquid Staking"},
                {"name": "Nameless", "tvl": null, "chains": null}
            ]"#,
        )
        .unwrap();

        let top = parse_protocols(protocols, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Lido");
        assert_eq!(top[0].change_7d, Some(2.0));
        assert_eq!(top[1].chains, vec!["Ethereum".to_string(), "Base".to_string()]);
    }

    #[test]
    fn test_protocol_tvl_bare_number() {
        let tvl = parse_protocol_tvl("aave", serde_json::json!(12345678901.5)).unwrap();
        assert_eq!(tvl.name, "aave");
        assert_eq!(tvl.tvl_usd, 12345678901.5);
        assert!(tvl.chains.is_empty());

        let err = parse_protocol_tvl("nope", serde_json::json!({"message": "not found"})).unwrap_err();
        assert_eq!(err.kind, FailureKind::NoData);
        assert_eq!(err.message, "Unexpected TVL response for nope");
    }

    #[test]
    fn test_fees_sorted_by_24h_total() {
        let response: FeesResponse = serde_json::from_str(
            r#"{"protocols": [
                {"name": "Small", "total24h": 10, "revenue24h": 1, "category": "Dexes"},
                {"name": "Unknown", "total24h": null},
                {"name": "Tether", "total24h": 20000000, "revenue24h": 20000000, "category": "Stablecoin Issuer"}
            ]}"#,
        )
        .unwrap();

        let fees = parse_fees(response.protocols, 10);
        let names: Vec<_> = fees.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Tether", "Small", "Unknown"]);
        assert_eq!(fees[2].fees_24h, None);
    }

    #[test]
    fn test_stablecoins_sorted_by_circulating_supply() {
        let response: StablecoinsResponse = serde_json::from_str(
            r#"{"peggedAssets": [
                {"name": "USD Coin", "symbol": "USDC", "pegType": "peggedUSD",
                 "circulating": {"peggedUSD": 33000000000}, "chains": ["Ethereum", "Base"]},
                {"name": "Tether", "symbol": "USDT", "pegType": "peggedUSD",
                 "circulating": {"peggedUSD": 110000000000}, "chains": ["Tron", "Ethereum"]},
                {"name": "Euro Coin", "symbol": "EURC", "pegType": "peggedEUR", "circulating": {}}
            ]}"#,
        )
        .unwrap();

        let coins = parse_stablecoins(response.pegged_assets, 2);
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].symbol, "USDT");
        assert_eq!(coins[0].circulating_usd, 110_000_000_000.0);
        assert_eq!(coins[1].peg_type, "peggedUSD");
    }

    #[test]
    fn test_empty_listing_is_no_data() {
        let err = non_empty(Vec::<Stablecoin>::new(), "stablecoins").unwrap_err();
        assert_eq!(err.kind, FailureKind::NoData);
        assert_eq!(err.message, "No stablecoins returned");
    }
}
