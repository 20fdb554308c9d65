//! Tool operations.
//!
//! Each operation turns one request into a fallback plan (cache key, TTL and
//! ordered sources) and hands it to the shared orchestrator.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainfeed_resilience::{
    source_fn, BatchPlan, BatchSource, CacheStats, FallbackOrchestrator, Fetched,
    ProviderFailure, ProviderId, SinglePlan, SingleSource, TtlConfig,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;

use crate::errors::{Result, ServiceError};
use crate::models::{
    is_evm_address, round2, Chain, DefiYield, FearGreed, GasPrice, MarketOverview, PriceRecord,
    ProtocolFees, ProtocolTvl, Stablecoin, TrendingCoin, WalletBalance, YieldQuery,
};
use crate::provider::{BalanceOracle, DefiSource, GasOracle};

/// Maximum symbols accepted by one price request.
pub const MAX_SYMBOLS: usize = 50;

/// Largest yield, protocol and fee listing one request may ask for.
pub const MAX_DEFI_LIMIT: usize = 100;

/// Largest stablecoin listing one request may ask for.
pub const MAX_STABLECOIN_LIMIT: usize = 50;

const UNRESOLVED_HINT: &str =
    "Try the CoinGecko id (e.g. 'bitcoin') or the token's exact DEX ticker";

/// Trait for the market data tool operations.
#[async_trait]
pub trait MarketDataServiceTrait: Send + Sync {
    /// Spot prices for up to [`MAX_SYMBOLS`] tickers or CoinGecko ids.
    ///
    /// Symbols no provider could price are omitted from the result.
    async fn crypto_prices(&self, symbols: &[String]) -> Result<Fetched<Vec<PriceRecord>>>;

    /// Global market cap, volume and BTC/ETH dominance.
    async fn market_overview(&self) -> Result<Fetched<MarketOverview>>;

    /// Coins trending in the last 24 hours.
    async fn trending_coins(&self) -> Result<Fetched<Vec<TrendingCoin>>>;

    /// Current Crypto Fear & Greed index.
    async fn fear_greed_index(&self) -> Result<Fetched<FearGreed>>;

    /// Slow/standard/fast gas prices for `chain`.
    async fn gas_prices(&self, chain: &str) -> Result<Fetched<GasPrice>>;

    /// Native balance of `address` on `chain`, with a USD value when the
    /// chain's gas token can be priced.
    async fn wallet_balance(&self, address: &str, chain: &str) -> Result<Fetched<WalletBalance>>;

    /// Yield pools matching `query`, largest TVL first.
    async fn defi_yields(&self, query: &YieldQuery) -> Result<Fetched<Vec<DefiYield>>>;

    /// The largest protocols by TVL.
    async fn top_protocols(&self, limit: usize) -> Result<Fetched<Vec<ProtocolTvl>>>;

    /// TVL of one protocol, by slug.
    async fn protocol_tvl(&self, slug: &str) -> Result<Fetched<ProtocolTvl>>;

    /// Protocols with the highest fees over the last 24 hours.
    async fn protocol_fees(&self, limit: usize) -> Result<Fetched<Vec<ProtocolFees>>>;

    /// The largest stablecoins by circulating supply.
    async fn stablecoin_stats(&self, limit: usize) -> Result<Fetched<Vec<Stablecoin>>>;

    /// Cache counters, for observability.
    fn cache_stats(&self) -> CacheStats;
}

/// Normalise a price request: trim, drop blanks, upper-case, de-duplicate
/// (first occurrence wins) and cap at [`MAX_SYMBOLS`].
pub fn normalize_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .take(MAX_SYMBOLS)
        .collect()
}

/// Cache key for a normalised symbol set; independent of request order.
pub fn prices_cache_key(symbols: &[String]) -> String {
    let mut sorted = symbols.to_vec();
    sorted.sort();
    format!("prices:{}", sorted.join(","))
}

pub fn gas_cache_key(chain: Chain) -> String {
    format!("gas:{}", chain)
}

/// Cache key for a yield listing; the chain filter is case-insensitive.
pub fn yields_cache_key(query: &YieldQuery) -> String {
    let chain = query
        .chain
        .as_deref()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "all".to_string());
    format!(
        "yields:{}:{}:{}:{}",
        chain, query.min_tvl, query.stablecoin_only, query.limit
    )
}

/// Clamp a listing size into `1..=max`.
fn clamp_limit(limit: usize, max: usize) -> usize {
    limit.clamp(1, max)
}

/// Protocol slugs go into a URL path: lower-case letters, digits, `-`, `.`, `_`.
fn normalize_slug(slug: &str) -> Result<String> {
    let slug = slug.trim().to_lowercase();
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if !valid {
        return Err(ServiceError::InvalidInput(format!(
            "Invalid protocol slug: {:?}",
            slug
        )));
    }
    Ok(slug)
}

/// Market data tool operations backed by a [`FallbackOrchestrator`].
pub struct MarketDataService {
    orchestrator: Arc<FallbackOrchestrator>,
    ttls: TtlConfig,
    price_sources: Vec<Arc<dyn BatchSource<PriceRecord>>>,
    overview_sources: Vec<Arc<dyn SingleSource<MarketOverview>>>,
    trending_sources: Vec<Arc<dyn SingleSource<Vec<TrendingCoin>>>>,
    fear_greed_sources: Vec<Arc<dyn SingleSource<FearGreed>>>,
    gas_oracles: Vec<Arc<dyn GasOracle>>,
    balance_oracles: Vec<Arc<dyn BalanceOracle>>,
    defi_sources: Vec<Arc<dyn DefiSource>>,
}

impl MarketDataService {
    /// Creates a new service builder.
    pub fn builder(orchestrator: Arc<FallbackOrchestrator>, ttls: TtlConfig) -> MarketDataServiceBuilder {
        MarketDataServiceBuilder {
            service: MarketDataService {
                orchestrator,
                ttls,
                price_sources: Vec::new(),
                overview_sources: Vec::new(),
                trending_sources: Vec::new(),
                fear_greed_sources: Vec::new(),
                gas_oracles: Vec::new(),
                balance_oracles: Vec::new(),
                defi_sources: Vec::new(),
            },
        }
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    /// A plan that runs `call` against each DeFi source in order.
    fn defi_plan<T, F>(&self, cache_key: String, ttl: Duration, call: F) -> SinglePlan<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn DefiSource>) -> BoxFuture<'static, std::result::Result<T, ProviderFailure>>
            + Clone
            + Send
            + Sync
            + 'static,
    {
        self.defi_sources
            .iter()
            .fold(SinglePlan::new(cache_key, ttl), |plan, source| {
                let source = source.clone();
                let call = call.clone();
                plan.source(source_fn(source.provider(), move || call(source.clone())))
            })
    }

    /// USD value of `balance` at the current price of `chain`'s gas token.
    ///
    /// Pricing is best effort: a balance without a USD value is still an answer.
    async fn native_value_usd(&self, chain: Chain, balance: f64) -> Option<f64> {
        let symbol = chain.native_symbol().to_string();
        match self.crypto_prices(std::slice::from_ref(&symbol)).await {
            Ok(prices) => prices
                .value
                .first()
                .map(|record| round2(balance * record.price_usd)),
            Err(e) => {
                debug!("No USD value for {} balance on {}: {}", symbol, chain, e);
                None
            }
        }
    }
}

/// Builder for [`MarketDataService`]. Sources of each kind are tried in the
/// order they are added.
pub struct MarketDataServiceBuilder {
    service: MarketDataService,
}

impl MarketDataServiceBuilder {
    pub fn price_source(mut self, source: Arc<dyn BatchSource<PriceRecord>>) -> Self {
        self.service.price_sources.push(source);
        self
    }

    pub fn overview_source(mut self, source: Arc<dyn SingleSource<MarketOverview>>) -> Self {
        self.service.overview_sources.push(source);
        self
    }

    pub fn trending_source(mut self, source: Arc<dyn SingleSource<Vec<TrendingCoin>>>) -> Self {
        self.service.trending_sources.push(source);
        self
    }

    pub fn fear_greed_source(mut self, source: Arc<dyn SingleSource<FearGreed>>) -> Self {
        self.service.fear_greed_sources.push(source);
        self
    }

    pub fn gas_oracle(mut self, oracle: Arc<dyn GasOracle>) -> Self {
        self.service.gas_oracles.push(oracle);
        self
    }

    pub fn balance_oracle(mut self, oracle: Arc<dyn BalanceOracle>) -> Self {
        self.service.balance_oracles.push(oracle);
        self
    }

    pub fn defi_source(mut self, source: Arc<dyn DefiSource>) -> Self {
        self.service.defi_sources.push(source);
        self
    }

    pub fn build(self) -> MarketDataService {
        self.service
    }
}

/// A gas oracle bound to one chain for the duration of a request.
struct ChainGas {
    oracle: Arc<dyn GasOracle>,
    chain: Chain,
}

#[async_trait]
impl SingleSource<GasPrice> for ChainGas {
    fn provider(&self) -> ProviderId {
        self.oracle.provider()
    }

    fn ready(&self) -> std::result::Result<(), ProviderFailure> {
        self.oracle.check(self.chain)
    }

    async fn fetch(&self) -> std::result::Result<GasPrice, ProviderFailure> {
        self.oracle.gas_price(self.chain).await
    }
}

fn single_plan<T>(
    cache_key: &str,
    ttl: Duration,
    sources: &[Arc<dyn SingleSource<T>>],
) -> SinglePlan<T> {
    sources
        .iter()
        .cloned()
        .fold(SinglePlan::new(cache_key, ttl), SinglePlan::shared_source)
}

#[async_trait]
impl MarketDataServiceTrait for MarketDataService {
    async fn crypto_prices(&self, symbols: &[String]) -> Result<Fetched<Vec<PriceRecord>>> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(ServiceError::InvalidInput(
                "At least one symbol is required".to_string(),
            ));
        }

        let cache_key = prices_cache_key(&symbols);
        let plan = self
            .price_sources
            .iter()
            .cloned()
            .fold(
                BatchPlan::new(&cache_key, self.ttls.prices, symbols.clone()),
                BatchPlan::shared_source,
            )
            .hint(UNRESOLVED_HINT);

        let fetched = self.orchestrator.run_batch(&plan).await?;
        debug!(
            "'{}' resolved {}/{} symbols ({})",
            cache_key,
            fetched.value.len(),
            symbols.len(),
            fetched.freshness.as_str()
        );

        // Caller's order, not the map's
        Ok(fetched.map(|mut by_symbol| {
            symbols
                .iter()
                .filter_map(|symbol| by_symbol.remove(symbol))
                .collect()
        }))
    }

    async fn market_overview(&self) -> Result<Fetched<MarketOverview>> {
        let plan = single_plan(
            "market_overview",
            self.ttls.market_overview,
            &self.overview_sources,
        );
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn trending_coins(&self) -> Result<Fetched<Vec<TrendingCoin>>> {
        let plan = single_plan("trending", self.ttls.trending, &self.trending_sources);
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn fear_greed_index(&self) -> Result<Fetched<FearGreed>> {
        let plan = single_plan("fear_greed", self.ttls.fear_greed, &self.fear_greed_sources);
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn gas_prices(&self, chain: &str) -> Result<Fetched<GasPrice>> {
        let chain: Chain = chain.parse()?;

        let plan = self.gas_oracles.iter().fold(
            SinglePlan::new(gas_cache_key(chain), self.ttls.gas),
            |plan, oracle| {
                plan.source(ChainGas {
                    oracle: oracle.clone(),
                    chain,
                })
            },
        );
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn wallet_balance(&self, address: &str, chain: &str) -> Result<Fetched<WalletBalance>> {
        let chain: Chain = chain.parse()?;
        let address = address.trim().to_string();
        if !is_evm_address(&address) {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid address: {:?}. Expected 0x followed by 40 hex digits",
                address
            )));
        }

        let cache_key = format!("balance:{}:{}", chain, address.to_lowercase());
        let plan = self.balance_oracles.iter().fold(
            SinglePlan::new(cache_key, self.ttls.wallet_balance),
            |plan, oracle| {
                let oracle = oracle.clone();
                let address = address.clone();
                plan.source(source_fn(oracle.provider(), move || {
                    let oracle = oracle.clone();
                    let address = address.clone();
                    async move { oracle.native_balance(chain, &address).await }.boxed()
                }))
            },
        );

        // USD is priced per request; the cached balance never carries it
        let mut fetched = self.orchestrator.run(&plan).await?;
        if fetched.value.balance_native > 0.0 {
            fetched.value.balance_usd = self
                .native_value_usd(chain, fetched.value.balance_native)
                .await;
        }
        Ok(fetched)
    }

    async fn defi_yields(&self, query: &YieldQuery) -> Result<Fetched<Vec<DefiYield>>> {
        if !query.min_tvl.is_finite() || query.min_tvl < 0.0 {
            return Err(ServiceError::InvalidInput(format!(
                "min_tvl must be a non-negative number, got {}",
                query.min_tvl
            )));
        }
        let query = YieldQuery {
            chain: query
                .chain
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            limit: clamp_limit(query.limit, MAX_DEFI_LIMIT),
            ..query.clone()
        };

        let cache_key = yields_cache_key(&query);
        let plan = self.defi_plan(cache_key, self.ttls.defi_yields, move |source| {
            let query = query.clone();
            async move { source.yields(&query).await }.boxed()
        });
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn top_protocols(&self, limit: usize) -> Result<Fetched<Vec<ProtocolTvl>>> {
        let limit = clamp_limit(limit, MAX_DEFI_LIMIT);
        let plan = self.defi_plan(
            format!("tvl:top:{}", limit),
            self.ttls.protocol_tvl,
            move |source| async move { source.top_protocols(limit).await }.boxed(),
        );
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn protocol_tvl(&self, slug: &str) -> Result<Fetched<ProtocolTvl>> {
        let slug = normalize_slug(slug)?;
        let cache_key = format!("tvl:{}", slug);
        let plan = self.defi_plan(cache_key, self.ttls.protocol_tvl, move |source| {
            let slug = slug.clone();
            async move { source.protocol_tvl(&slug).await }.boxed()
        });
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn protocol_fees(&self, limit: usize) -> Result<Fetched<Vec<ProtocolFees>>> {
        let limit = clamp_limit(limit, MAX_DEFI_LIMIT);
        let plan = self.defi_plan(
            format!("fees:{}", limit),
            self.ttls.protocol_fees,
            move |source| async move { source.protocol_fees(limit).await }.boxed(),
        );
        Ok(self.orchestrator.run(&plan).await?)
    }

    async fn stablecoin_stats(&self, limit: usize) -> Result<Fetched<Vec<Stablecoin>>> {
        let limit = clamp_limit(limit, MAX_STABLECOIN_LIMIT);
        let plan = self.defi_plan(
            format!("stablecoins:{}", limit),
            self.ttls.stablecoins,
            move |source| async move { source.stablecoins(limit).await }.boxed(),
        );
        Ok(self.orchestrator.run(&plan).await?)
    }

    fn cache_stats(&self) -> CacheStats {
        self.orchestrator.cache().stats()
    }
}
