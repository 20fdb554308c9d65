use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chainfeed_market_data::GasPrice;

use crate::{error::ApiResult, main_lib::AppState, models::ToolResponse};

#[utoipa::path(
    get,
    path = "/api/v1/gas/{chain}",
    params(("chain" = String, Path, description = "ethereum, base, arbitrum, polygon, optimism or bsc")),
    responses(
        (status = 200, description = "Slow/standard/fast gas prices in gwei"),
        (status = 400, description = "Unsupported chain")
    )
)]
pub async fn get_gas_prices(
    Path(chain): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ToolResponse<GasPrice>>> {
    let fetched = state.market_data.gas_prices(&chain).await?;
    Ok(Json(fetched.into()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/gas/{chain}", get(get_gas_prices))
}
