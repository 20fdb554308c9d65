use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chainfeed_market_data::WalletBalance;

use crate::{error::ApiResult, main_lib::AppState, models::ToolResponse};

#[utoipa::path(
    get,
    path = "/api/v1/wallet/{chain}/{address}/balance",
    params(
        ("chain" = String, Path, description = "ethereum, base, arbitrum, polygon, optimism or bsc"),
        ("address" = String, Path, description = "0x-prefixed wallet address")
    ),
    responses(
        (status = 200, description = "Native balance, with USD value when priced"),
        (status = 400, description = "Unsupported chain or malformed address")
    )
)]
pub async fn get_wallet_balance(
    Path((chain, address)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ToolResponse<WalletBalance>>> {
    let fetched = state.market_data.wallet_balance(&address, &chain).await?;
    Ok(Json(fetched.into()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/wallet/{chain}/{address}/balance", get(get_wallet_balance))
}
