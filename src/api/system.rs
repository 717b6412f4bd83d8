use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::observability::metrics_handler;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub kv_store: &'static str,
    pub database: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub fn create_system_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let kv_store = match state.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            warn!("KV store health check failed: {}", e);
            "down"
        }
    };

    let database = match &state.db_pool {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => "up",
            Err(e) => {
                warn!("Database health check failed: {}", e);
                "down"
            }
        },
        None => "not_configured",
    };

    let healthy = kv_store == "up" && database != "down";
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" },
            environment: state.config.app.environment.clone(),
            kv_store,
            database,
            timestamp: chrono::Utc::now(),
        }),
    )
}
