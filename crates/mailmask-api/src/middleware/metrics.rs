//! Metrics tracking middleware
//!
//! Tracks request counts, latency and status codes for the JSON metrics
//! endpoint.
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Label used for requests that matched no route
const UNMATCHED: &str = "unmatched";

/// Metrics tracking middleware
///
/// Records:
/// - Total request count
/// - Request latency per endpoint
/// - Response status codes per endpoint
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(request.extensions().get::<MatchedPath>());

    state.increment_requests();
    let response = next.run(request).await;

    let latency_us = start.elapsed().as_micros() as u64;
    state
        .record_request(endpoint, response.status().as_u16(), latency_us)
        .await;

    response
}

/// Route template for grouping; unknown paths share one label
fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_label() {
        assert_eq!(endpoint_label(None), "unmatched");
    }
}
