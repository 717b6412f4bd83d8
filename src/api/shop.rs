use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use shared::AppError;
use std::sync::Arc;
use tracing::debug;

use super::common::ApiResponse;
use crate::domains::shop::{Shop, ShopUpdate};
use crate::state::AppState;

pub fn create_shop_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shop/:id", get(get_shop))
        .route("/shop", put(update_shop))
}

/// GET /shop/:id
pub async fn get_shop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Shop>>, AppError> {
    debug!(shop_id = id, "Shop lookup");
    let shop = state.shop_service.query_by_id(id).await?;
    Ok(Json(ApiResponse::success(shop)))
}

/// PUT /shop
pub async fn update_shop(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ShopUpdate>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.shop_service.update(update).await?;
    Ok(Json(ApiResponse::success(())))
}
