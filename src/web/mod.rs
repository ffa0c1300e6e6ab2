//! # Web Module
//!
//! Axum HTTP surface of the exporter.
//!
//! - `GET /metrics` - Prometheus text exposition of every exported metric
//! - `GET /health` - liveness check
//!
//! The server binds all interfaces on the configured port.

pub mod handlers;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{ExporterError, Result};
use state::AppState;

/// Create the application router
pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::scrape))
        .route("/health", get(handlers::health::basic_health))
        .with_state(app_state)
}

/// Metrics HTTP server bound to a listening socket
pub struct MetricsServer {
    listener: TcpListener,
    app: Router,
}

impl MetricsServer {
    /// Bind `0.0.0.0:port`. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16, app_state: AppState) -> Result<Self> {
        let address = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(address).await.map_err(|e| {
            ExporterError::Server(std::io::Error::new(
                e.kind(),
                format!("failed to bind {address}: {e}"),
            ))
        })?;
        Ok(Self {
            listener,
            app: create_app(app_state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(address = %self.local_addr()?, "Metrics server listening");
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Metrics server stopped");
        Ok(())
    }
}
