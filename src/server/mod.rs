//! HTTP serving layer
//!
//! Thin axum wrapper around [`OutageService`]: shared state, middleware
//! layers and the listener lifecycle. All route and response definitions
//! live in [`api`].

pub mod api;

pub use api::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::service::OutageService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OutageService>,
}

/// API server over a shared [`OutageService`]
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(service: Arc<OutageService>) -> Self {
        Self {
            state: AppState { service },
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with middleware layers
    ///
    /// CORS is wide open: the API is consumed by third-party widgets and
    /// mobile apps from arbitrary origins.
    pub fn build_router(&self) -> Router {
        create_router(self.state.clone())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until interrupted
    pub async fn run(&self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "API server listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install shutdown handler");
    }
}
