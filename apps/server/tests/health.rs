use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chainfeed_market_data::{
    DefiSource, DefiYield, MarketDataService, PriceRecord, ProtocolFees, ProtocolTvl, Stablecoin,
    YieldQuery,
};
use chainfeed_resilience::{
    BatchSource, Cache, FallbackOrchestrator, FallbackPolicy, ProviderFailure, ProviderId,
    RateLimiters, TtlConfig,
};
use chainfeed_server::{api::app_router, build_state, config::Config, AppState};
use serde_json::Value;
use tower::ServiceExt;

fn test_config() -> Config {
    Config::from_lookup(|_| None)
}

/// Router wired to the real providers. Only used for requests that never
/// reach the network.
fn default_router() -> Router {
    let config = test_config();
    let state = build_state(&config);
    app_router(state, &config)
}

struct FixedPrices {
    id: &'static str,
    prices: HashMap<String, f64>,
}

#[async_trait]
impl BatchSource<PriceRecord> for FixedPrices {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed(self.id)
    }

    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, PriceRecord>, ProviderFailure> {
        let found: HashMap<_, _> = keys
            .iter()
            .filter_map(|k| {
                self.prices
                    .get(k)
                    .map(|p| (k.clone(), PriceRecord::new(k.clone(), k.to_lowercase(), *p, self.id)))
            })
            .collect();
        if found.is_empty() {
            return Err(ProviderFailure::network(self.id, "connection refused"));
        }
        Ok(found)
    }
}

fn router_with_prices(prices: &[(&str, f64)]) -> Router {
    let orchestrator = Arc::new(FallbackOrchestrator::new(
        Arc::new(Cache::new(100)),
        Arc::new(RateLimiters::new()),
        FallbackPolicy::default(),
    ));
    let source = FixedPrices {
        id: "mock",
        prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
    };
    let service = MarketDataService::builder(orchestrator, TtlConfig::default())
        .price_source(Arc::new(source))
        .build();
    let state = Arc::new(AppState {
        market_data: Arc::new(service),
    });
    app_router(state, &test_config())
}

/// Answers yield queries by echoing the filters back as a single pool.
struct EchoDefi;

#[async_trait]
impl DefiSource for EchoDefi {
    fn provider(&self) -> ProviderId {
        Cow::Borrowed("defillama")
    }

    async fn yields(&self, query: &YieldQuery) -> Result<Vec<DefiYield>, ProviderFailure> {
        Ok(vec![DefiYield {
            pool: format!("limit-{}", query.limit),
            project: "echo".to_string(),
            chain: query.chain.clone().unwrap_or_default(),
            tvl_usd: query.min_tvl,
            apy: 1.0,
            apy_base: None,
            apy_reward: None,
            stablecoin: query.stablecoin_only,
            source: "defillama".to_string(),
        }])
    }

    async fn top_protocols(&self, _limit: usize) -> Result<Vec<ProtocolTvl>, ProviderFailure> {
        Err(ProviderFailure::network("defillama", "connection refused"))
    }

    async fn protocol_tvl(&self, _slug: &str) -> Result<ProtocolTvl, ProviderFailure> {
        Err(ProviderFailure::network("defillama", "connection refused"))
    }

    async fn protocol_fees(&self, _limit: usize) -> Result<Vec<ProtocolFees>, ProviderFailure> {
        Err(ProviderFailure::network("defillama", "connection refused"))
    }

    async fn stablecoins(&self, _limit: usize) -> Result<Vec<Stablecoin>, ProviderFailure> {
        Err(ProviderFailure::network("defillama", "connection refused"))
    }
}

fn router_with_defi() -> Router {
    let orchestrator = Arc::new(FallbackOrchestrator::new(
        Arc::new(Cache::new(100)),
        Arc::new(RateLimiters::new()),
        FallbackPolicy::default(),
    ));
    let service = MarketDataService::builder(orchestrator, TtlConfig::default())
        .defi_source(Arc::new(EchoDefi))
        .build();
    let state = Arc::new(AppState {
        market_data: Arc::new(service),
    });
    app_router(state, &test_config())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn healthz_works() {
    let app = default_router();
    let response = app
        .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn openapi_lists_tool_routes() {
    let (status, body) = get(default_router(), "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/gas/{chain}"].is_object());
    assert!(body["paths"]["/api/v1/prices"].is_object());
    assert!(body["paths"]["/api/v1/wallet/{chain}/{address}/balance"].is_object());
    assert!(body["paths"]["/api/v1/defi/protocols/{slug}"].is_object());
    assert!(body["paths"]["/api/v1/defi/stablecoins"].is_object());
}

#[tokio::test]
async fn cache_stats_start_empty() {
    let (status, body) = get(default_router(), "/api/v1/cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], 0);
    assert_eq!(body["max_entries"], 10_000);
}

#[tokio::test]
async fn unsupported_chain_is_bad_request() {
    let (status, body) = get(default_router(), "/api/v1/gas/solana").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported chain: solana"));
}

#[tokio::test]
async fn missing_symbols_is_bad_request() {
    let (status, _) = get(default_router(), "/api/v1/prices").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(default_router(), "/api/v1/prices?symbols=,%20,").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn prices_report_provider_then_cache() {
    let app = router_with_prices(&[("BTC", 65_000.0), ("ETH", 3_200.0)]);

    let (status, body) = get(app.clone(), "/api/v1/prices?symbols=eth,btc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["freshness"], "live");
    assert_eq!(body["providers"], serde_json::json!(["mock"]));
    assert_eq!(body["data"][0]["symbol"], "ETH");
    assert_eq!(body["data"][1]["price_usd"], 65_000.0);

    let (status, body) = get(app, "/api/v1/prices?symbols=BTC,ETH").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["freshness"], "cached");
    assert!(body.get("providers").is_none());
}

#[tokio::test]
async fn all_providers_failing_is_bad_gateway() {
    let app = router_with_prices(&[]);
    let (status, body) = get(app, "/api/v1/prices?symbols=BTC").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], 502);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("mock: connection refused"));
    assert!(message.contains("unresolved: BTC"));
}

#[tokio::test]
async fn tool_without_sources_is_internal_error() {
    let app = router_with_prices(&[]);
    let (status, body) = get(app, "/api/v1/market/trending").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().contains("trending"));
}

#[tokio::test]
async fn malformed_wallet_address_is_bad_request() {
    let (status, body) = get(default_router(), "/api/v1/wallet/ethereum/vitalik.eth/balance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Invalid address"));
}

#[tokio::test]
async fn invalid_defi_parameters_are_bad_requests() {
    let (status, _) = get(default_router(), "/api/v1/defi/protocols/bad%20slug").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(default_router(), "/api/v1/defi/yields?min_tvl=-5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn yield_filters_reach_the_provider() {
    let (status, body) = get(
        router_with_defi(),
        "/api/v1/defi/yields?chain=Base&min_tvl=1000&stablecoin_only=true&limit=500",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["freshness"], "live");
    let pool = &body["data"][0];
    assert_eq!(pool["pool"], "limit-100");
    assert_eq!(pool["chain"], "Base");
    assert_eq!(pool["tvl_usd"], 1000.0);
    assert_eq!(pool["stablecoin"], true);
}

#[tokio::test]
async fn defi_outage_is_bad_gateway() {
    let (status, body) = get(router_with_defi(), "/api/v1/defi/fees?limit=5").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("defillama: connection refused"));
}
