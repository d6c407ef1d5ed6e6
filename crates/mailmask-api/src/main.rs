//! mailmask API Server
//!
//! REST API server for masking and classifying support emails.
//!
//! Author: hephaex@gmail.com

use mailmask_api::{create_router, state::AppState};
use mailmask_core::config::{AppConfig, LoggingConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration: optional TOML file, then environment overrides
    let config = match std::env::var("MAILMASK_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // The engine and classifier are built once and shared by all requests
    let state = Arc::new(AppState::from_config(config)?);
    tracing::info!(
        classifier = state.processor.classifier_name(),
        "Email processor initialized"
    );

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("mailmask API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{},mailmask_api=debug,tower_http=debug",
            logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves on ctrl-c; `/ready` reports 503 while in-flight requests drain
async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    state.set_ready(false);
    tracing::info!("Shutdown signal received, no longer ready");
}
