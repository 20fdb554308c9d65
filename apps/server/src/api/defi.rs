use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chainfeed_market_data::{DefiYield, ProtocolFees, ProtocolTvl, Stablecoin, YieldQuery};
use serde::Deserialize;

use crate::{error::ApiResult, main_lib::AppState, models::ToolResponse};

const DEFAULT_LIMIT: usize = 20;

#[derive(Deserialize)]
pub struct YieldsQuery {
    /// Chain name, any case (e.g. "Arbitrum")
    chain: Option<String>,
    min_tvl: Option<f64>,
    stablecoin_only: Option<bool>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// Yield pools, largest TVL first.
#[utoipa::path(
    get,
    path = "/api/v1/defi/yields",
    params(
        ("chain" = Option<String>, Query, description = "Only pools on this chain"),
        ("min_tvl" = Option<f64>, Query, description = "Minimum pool TVL in USD"),
        ("stablecoin_only" = Option<bool>, Query, description = "Only stablecoin pools"),
        ("limit" = Option<usize>, Query, description = "At most this many pools (1-100, default 20)")
    ),
    responses(
        (status = 200, description = "Yield pools"),
        (status = 400, description = "Invalid filter"),
        (status = 502, description = "Every provider failed")
    )
)]
pub async fn get_yields(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YieldsQuery>,
) -> ApiResult<Json<ToolResponse<Vec<DefiYield>>>> {
    let query = YieldQuery {
        chain: query.chain,
        min_tvl: query.min_tvl.unwrap_or(0.0),
        stablecoin_only: query.stablecoin_only.unwrap_or(false),
        limit: query.limit.unwrap_or(DEFAULT_LIMIT),
    };
    let fetched = state.market_data.defi_yields(&query).await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/defi/protocols",
    params(("limit" = Option<usize>, Query, description = "1-100, default 20")),
    responses((status = 200, description = "Largest protocols by TVL"))
)]
pub async fn get_top_protocols(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<ToolResponse<Vec<ProtocolTvl>>>> {
    let fetched = state.market_data.top_protocols(query.limit()).await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/defi/protocols/{slug}",
    params(("slug" = String, Path, description = "Protocol slug, e.g. aave")),
    responses(
        (status = 200, description = "Protocol TVL"),
        (status = 400, description = "Invalid slug")
    )
)]
pub async fn get_protocol_tvl(
    Path(slug): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ToolResponse<ProtocolTvl>>> {
    let fetched = state.market_data.protocol_tvl(&slug).await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/defi/fees",
    params(("limit" = Option<usize>, Query, description = "1-100, default 20")),
    responses((status = 200, description = "Protocols by 24h fees"))
)]
pub async fn get_protocol_fees(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<ToolResponse<Vec<ProtocolFees>>>> {
    let fetched = state.market_data.protocol_fees(query.limit()).await?;
    Ok(Json(fetched.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/defi/stablecoins",
    params(("limit" = Option<usize>, Query, description = "1-50, default 20")),
    responses((status = 200, description = "Stablecoins by circulating supply"))
)]
pub async fn get_stablecoins(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<ToolResponse<Vec<Stablecoin>>>> {
    let fetched = state.market_data.stablecoin_stats(query.limit()).await?;
    Ok(Json(fetched.into()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/defi/yields", get(get_yields))
        .route("/defi/protocols", get(get_top_protocols))
        .route("/defi/protocols/{slug}", get(get_protocol_tvl))
        .route("/defi/fees", get(get_protocol_fees))
        .route("/defi/stablecoins", get(get_stablecoins))
}
