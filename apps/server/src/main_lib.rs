use std::sync::Arc;

use chainfeed_market_data::{
    CoinCapProvider, CoinGeckoProvider, DefiLlamaProvider, DexScreenerProvider,
    ExplorerGasOracle, FearGreedProvider, MarketDataService, MarketDataServiceTrait, RpcProvider,
};
use chainfeed_resilience::{Cache, FallbackOrchestrator, RateLimiters};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};

pub struct AppState {
    pub market_data: Arc<dyn MarketDataServiceTrait>,
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

/// Wire the cache, limiters, providers and service together.
pub fn build_state(config: &Config) -> Arc<AppState> {
    let cache = Arc::new(Cache::new(config.cache.max_entries));
    let limiters = Arc::new(RateLimiters::from_configs(&config.rate_limits));
    let orchestrator = Arc::new(FallbackOrchestrator::new(
        cache,
        limiters.clone(),
        config.policy.clone(),
    ));

    let settings = &config.providers;
    let timeout = settings.http_timeout;

    let coingecko = Arc::new(CoinGeckoProvider::new(&settings.coingecko_url, timeout));
    let coincap = Arc::new(CoinCapProvider::new(&settings.coincap_url, timeout));
    let dexscreener = Arc::new(DexScreenerProvider::new(
        &settings.dexscreener_url,
        timeout,
        config.ttls.dex_prices,
    ));
    let fear_greed = Arc::new(FearGreedProvider::new(&settings.fear_greed_url, timeout));
    let explorer = Arc::new(ExplorerGasOracle::new(settings.explorers.clone(), timeout));
    let rpc = Arc::new(RpcProvider::new(&settings.rpc_urls, timeout));
    let defillama = Arc::new(DefiLlamaProvider::new(
        &settings.defillama_url,
        &settings.defillama_yields_url,
        &settings.defillama_stablecoins_url,
        timeout,
    ));

    let configured_explorers = settings
        .explorers
        .iter()
        .filter(|(_, endpoint)| endpoint.api_key.is_some())
        .count();
    tracing::info!(
        "Market data ready: {} rate limiters, {} explorer key(s), {} custom RPC url(s)",
        limiters.len(),
        configured_explorers,
        settings.rpc_urls.len()
    );

    let market_data = MarketDataService::builder(orchestrator, config.ttls.clone())
        .price_source(coingecko.clone())
        .price_source(coincap)
        .price_source(dexscreener)
        .overview_source(coingecko.clone())
        .trending_source(coingecko)
        .fear_greed_source(fear_greed)
        .gas_oracle(explorer)
        .gas_oracle(rpc.clone())
        .balance_oracle(rpc)
        .defi_source(defillama)
        .build();

    Arc::new(AppState {
        market_data: Arc::new(market_data),
    })
}
