pub mod common;
pub mod shop;
pub mod system;
pub mod voucher;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(shop::create_shop_router())
        .merge(voucher::create_voucher_router())
        .merge(system::create_system_router())
}
