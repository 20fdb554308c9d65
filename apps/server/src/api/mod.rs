mod defi;
mod gas;
mod market;
mod wallet;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use chainfeed_resilience::CacheStats;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{config::Config, main_lib::AppState};

#[utoipa::path(get, path = "/api/v1/healthz", responses((status = 200, description = "Health")))]
pub async fn healthz() -> &'static str {
    "ok"
}

/// Cache counters, for observability.
#[utoipa::path(get, path = "/api/v1/cache/stats", responses((status = 200, description = "Cache counters")))]
async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.market_data.cache_stats())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        healthz,
        cache_stats,
        market::get_prices,
        market::get_market_overview,
        market::get_trending,
        market::get_fear_greed,
        gas::get_gas_prices,
        wallet::get_wallet_balance,
        defi::get_yields,
        defi::get_top_protocols,
        defi::get_protocol_tvl,
        defi::get_protocol_fees,
        defi::get_stablecoins
    ),
    tags((name = "chainfeed"))
)]
pub struct ApiDoc;

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect::<Vec<HeaderValue>>();
        CorsLayer::new().allow_origin(origins)
    };

    let openapi = ApiDoc::openapi();

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/cache/stats", get(cache_stats))
        .merge(market::router())
        .merge(gas::router())
        .merge(wallet::router())
        .merge(defi::router());

    Router::new()
        .nest("/api/v1", api)
        .route(
            "/openapi.json",
            get(move || {
                let openapi = openapi.clone();
                async move { Json(openapi) }
            }),
        )
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
