// ============================================================
// Layer 1 — HTTP API
// ============================================================
// The network-facing half of the presentation layer.
//
//   handlers.rs — /health and /predict
//
// The router carries permissive CORS (the web frontend is served
// from another origin), per-request tracing, and an upload size
// limit. serve() binds the configured address and shuts down
// cleanly on Ctrl+C or SIGTERM.

pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use burn::prelude::*;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::application::inference_service::InferenceService;
use crate::infra::config::ServiceConfig;

/// Shared application state
pub struct AppState<B: Backend> {
    pub service: Arc<InferenceService<B>>,
    /// Size of the configured label set, for fallback health bodies
    pub labels:  usize,
}

impl<B: Backend> AppState<B> {
    pub fn new(service: Arc<InferenceService<B>>, labels: usize) -> Self {
        Self { service, labels }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self { service: self.service.clone(), labels: self.labels }
    }
}

/// Build the application router.
pub fn create_app<B: Backend>(state: AppState<B>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health::<B>))
        .route("/predict", post(handlers::predict::<B>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until a shutdown signal arrives.
pub async fn serve<B: Backend>(service: Arc<InferenceService<B>>, config: &ServiceConfig) -> Result<()> {
    let state = AppState::new(service, config.labels.len());
    let app   = create_app(state, config.max_upload_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;

    tracing::info!("Serving on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c    => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
