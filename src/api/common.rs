use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use serde::Serialize;
use shared::AppError;
use uuid::Uuid;

/// Header carrying the caller identity. Authentication happens upstream.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub request_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            request_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Caller identity taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(CurrentUser)
            .ok_or_else(|| AppError::bad_request(format!("missing or invalid {} header", USER_ID_HEADER)))
    }
}
