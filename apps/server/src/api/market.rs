use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chainfeed_market_data::{FearGreed, MarketOverview, PriceRecord, TrendingCoin};
use serde::Deserialize;

use crate::{error::ApiResult, main_lib::AppState, models::ToolResponse};

#[derive(Deserialize)]
pub struct PricesQuery {
    /// Comma-separated tickers or CoinGecko ids.
    symbols: Option<String>,
}

/// Spot prices. Symbols no provider could price are left out.
#[utoipa::path(
    get,
    path = "/api/v1/prices",
    params(("symbols" = String, Query, description = "Comma-separated symbols, e.g. BTC,ETH")),
    responses(
        (status = 200, description = "Prices"),
        (status = 400, description = "No usable symbols"),
        (status = 502, description = "Every provider failed")
    )
)]
pub async fn get_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PricesQuery>,
) -> ApiResult<Json<ToolResponse<Vec<PriceRecord>>>> {
    let symbols: Vec<String> = query
        .symbols
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::to_string)
        .collect();
    let fetched = state.market_data.crypto_prices(&symbols).await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(get, path = "/api/v1/market/overview", responses((status = 200, description = "Global market overview")))]
pub async fn get_market_overview(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ToolResponse<MarketOverview>>> {
    let fetched = state.market_data.market_overview().await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(get, path = "/api/v1/market/trending", responses((status = 200, description = "Trending coins")))]
pub async fn get_trending(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ToolResponse<Vec<TrendingCoin>>>> {
    let fetched = state.market_data.trending_coins().await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(get, path = "/api/v1/sentiment/fear-greed", responses((status = 200, description = "Fear & Greed index")))]
pub async fn get_fear_greed(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ToolResponse<FearGreed>>> {
    let fetched = state.market_data.fear_greed_index().await?;
    Ok(Json(fetched.into()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/prices", get(get_prices))
        .route("/market/overview", get(get_market_overview))
        .route("/market/trending", get(get_trending))
        .route("/sentiment/fear-greed", get(get_fear_greed))
}
