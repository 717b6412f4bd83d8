// ============================================================================
// HTTP METRICS MIDDLEWARE
// ============================================================================

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::record_http_request;

/// Records count and latency of every request passing through the router
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = normalize_path(req.uri().path());

    let response = next.run(req).await;

    record_http_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Collapse numeric path segments so `/shop/17` and `/shop/18` share a label
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if !seg.is_empty() && seg.parse::<i64>().is_ok() {
                ":id"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/shop/17"), "/shop/:id");
        assert_eq!(normalize_path("/voucher-order/seckill/9"), "/voucher-order/seckill/:id");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
