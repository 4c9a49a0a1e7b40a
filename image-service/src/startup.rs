//! Application startup and lifecycle management.

use crate::config::ImageConfig;
use crate::handlers;
use crate::services::{init_metrics, Database, ImageService, PgImageService};
use axum::{
    extract::DefaultBodyLimit,
    http::Uri,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ImageConfig,
    pub images: Arc<dyn ImageService>,
}

/// Image routes, relative to the API prefix.
fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/images/upload", post(handlers::upload_images))
        .route(
            "/images/image/download/:image_id",
            get(handlers::download_image),
        )
        .route("/images/image/:image_id/update", put(handlers::update_image))
        .route(
            "/images/image/:image_id/delete",
            delete(handlers::delete_image),
        )
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}

/// Build the full HTTP router: image routes under the configured prefix plus
/// the health and metrics endpoints at the root.
pub fn build_router(state: AppState) -> Router {
    let prefix = state.config.api.prefix.clone();
    let max_upload_bytes = state.config.api.max_upload_bytes;

    let api = if prefix.is_empty() {
        image_routes()
    } else {
        Router::new().nest(&prefix, image_routes())
    };

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(api)
        .fallback(route_not_found)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect to PostgreSQL, apply migrations and bind the listener.
    pub async fn build(config: ImageConfig) -> Result<Self, AppError> {
        let db = Database::new(&config.database).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let images: Arc<dyn ImageService> =
            Arc::new(PgImageService::new(db, config.api.prefix.clone()));

        Self::build_with_service(config, images).await
    }

    /// Bind the listener around an already constructed `ImageService`.
    pub async fn build_with_service(
        config: ImageConfig,
        images: Arc<dyn ImageService>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let state = AppState {
            config: config.clone(),
            images,
        };

        let host: std::net::IpAddr = config.common.host.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid host '{}': {}",
                config.common.host,
                e
            ))
        })?;
        let addr = SocketAddr::from((host, config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, prefix = %config.api.prefix, "Image service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "image-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
