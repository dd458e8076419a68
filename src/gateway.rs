//! HTTP-to-uwsgi gateway server.
//!
//! # Responsibilities
//! - Build the axum Router that forwards every request to the backend
//! - Wire up middleware (request tracing, whole-request timeout)
//! - Serve on a TCP listener with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::forward::Forwarder;

/// Application state injected into the forward handler.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
}

/// HTTP server that bridges every request to one uwsgi backend.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState {
            forwarder: Arc::new(Forwarder::new(config.backend.address.clone())),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %listener.local_addr()?,
            backend = %self.config.backend.address,
            "gateway starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Forward one request to the backend; a failed forward is a 502.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match state.forwarder.forward(request).await {
        Ok(response) => {
            tracing::debug!(
                method = %method,
                path = %path,
                status = %response.status(),
                "request forwarded"
            );
            response
        }
        Err(err) => {
            tracing::error!(method = %method, path = %path, error = %err, "forward failed");
            (StatusCode::BAD_GATEWAY, "Backend request failed").into_response()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
