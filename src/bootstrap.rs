//! # Exporter Bootstrap
//!
//! Wires configuration, the metrics registry, the lifecycle monitor and the
//! metrics server together, then runs an event source until it ends, fails, or
//! shutdown is requested.

use std::future::Future;

use prometheus::Registry;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::ExporterConfig;
use crate::error::{ExporterError, Result};
use crate::monitor::Monitor;
use crate::sources::{event_source_for, EventSource};
use crate::web::state::AppState;
use crate::web::MetricsServer;

pub struct Exporter {
    config: ExporterConfig,
    registry: Registry,
    monitor: Monitor,
}

impl Exporter {
    pub fn new(config: ExporterConfig) -> Result<Self> {
        config.validate()?;

        let registry = Registry::new();
        let monitor = Monitor::new(config.max_tasks_captured, &registry)?;

        info!(
            broker = %config.broker_url_redacted(),
            backend = ?config.backend_url_redacted(),
            max_tasks_captured = config.max_tasks_captured,
            port = config.port,
            "🚀 BOOTSTRAP: Exporter configured"
        );

        Ok(Self {
            config,
            registry,
            monitor,
        })
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Event source for the configured broker's transport
    pub fn broker_source(&self) -> Result<Box<dyn EventSource>> {
        event_source_for(&self.config.broker_url)
    }

    /// Serve metrics and feed `source` into the monitor.
    ///
    /// Returns when the source is exhausted, when `shutdown` resolves, or with
    /// the first error from the source or the server.
    pub async fn run<S, F>(&self, source: &mut S, shutdown: F) -> Result<()>
    where
        S: EventSource + ?Sized,
        F: Future<Output = ()> + Send,
    {
        let app_state = AppState::new(self.registry.clone(), self.monitor.clone());
        let server = MetricsServer::bind(self.config.port, app_state).await?;
        info!(address = %server.local_addr()?, "✅ BOOTSTRAP: Metrics server bound");

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut server_task = tokio::spawn(server.serve(async move {
            let _ = stop_rx.await;
        }));

        let outcome = tokio::select! {
            result = self.monitor.run(source) => result,
            () = shutdown => {
                info!("🛑 BOOTSTRAP: Shutdown signal received");
                Ok(())
            }
            joined = &mut server_task => {
                warn!("Metrics server stopped before the event source");
                return flatten_join(joined);
            }
        };

        let _ = stop_tx.send(());
        settle(outcome, flatten_join(server_task.await))
    }
}

/// The source's result takes precedence; a server failure is only returned
/// when the source itself finished cleanly
fn settle(outcome: Result<()>, server: Result<()>) -> Result<()> {
    match (outcome, server) {
        (Err(source_error), Err(server_error)) => {
            error!(error = %server_error, "Metrics server failed while stopping");
            Err(source_error)
        }
        (Err(source_error), Ok(())) => Err(source_error),
        (Ok(()), server) => server,
    }
}

fn flatten_join(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| ExporterError::Server(std::io::Error::other(e.to_string())))?
}
