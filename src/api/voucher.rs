use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use shared::AppError;
use std::sync::Arc;

use super::common::{ApiResponse, CurrentUser};
use crate::domains::voucher::{PublishSeckillVoucher, SeckillVoucher};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SeckillOrderResponse {
    pub order_id: i64,
}

pub fn create_voucher_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voucher/seckill", post(publish_seckill_voucher))
        .route("/voucher-order/seckill/:id", post(seckill_voucher))
}

/// POST /voucher/seckill
pub async fn publish_seckill_voucher(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishSeckillVoucher>,
) -> Result<Json<ApiResponse<SeckillVoucher>>, AppError> {
    let voucher = state.seckill_service.publish_seckill_voucher(request).await?;
    Ok(Json(ApiResponse::success(voucher)))
}

/// POST /voucher-order/seckill/:id
///
/// Returns as soon as the purchase is admitted; the order row is written
/// asynchronously by the order processor.
pub async fn seckill_voucher(
    State(state): State<Arc<AppState>>,
    Path(voucher_id): Path<i64>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<SeckillOrderResponse>>, AppError> {
    let order_id = state
        .seckill_service
        .seckill_voucher(voucher_id, user_id)
        .await?;
    Ok(Json(ApiResponse::success(SeckillOrderResponse { order_id })))
}
