use axum::{middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::compression::{predicate::SizeAbove, CompressionLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod cache_key;
pub mod domains;
pub mod observability;
pub mod optimization;
pub mod services;
pub mod state;
pub mod store;

use api::create_api_router;
use observability::metrics_middleware;
use state::AppState;

pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_api_router()
        .with_state(app_state)
        .layer(axum_middleware::from_fn(metrics_middleware)) // 📊 request metrics
        .layer(
            CompressionLayer::new()
                .gzip(true)
                .compress_when(SizeAbove::new(1024)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
