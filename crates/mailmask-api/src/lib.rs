//! mailmask API - REST server
//!
//! Provides HTTP endpoints for masking and classifying support emails.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use mailmask_core::config::ServerConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::health::metrics,
        handlers::classify::classify_email,
        handlers::classify::mask_email,
    ),
    components(schemas(
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::BuildInfo,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
        handlers::classify::EmailRequest,
        handlers::classify::MaskedEntityResponse,
        handlers::classify::ClassifyResponse,
        handlers::classify::MaskResponse,
    )),
    tags(
        (name = "email", description = "PII masking and email classification"),
        (name = "health", description = "Service health and metrics")
    ),
    info(
        title = "mailmask API",
        description = "Masks PII/PCI data in support emails and classifies them"
    )
)]
pub struct ApiDoc;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/classify", post(handlers::classify::classify_email))
        .route("/mask", post(handlers::classify::mask_email))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(RequestBodyLimitLayer::new(server.max_body_size));

    if let Some(cors) = cors_layer(server) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// CORS policy from config; `None` when disabled
fn cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    if !server.cors_enabled {
        return None;
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
    )
}

/// Router with default config and the keyword classifier
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    let state = AppState::from_config(mailmask_core::AppConfig::default())
        .expect("default config must build");
    create_router(Arc::new(state))
}
