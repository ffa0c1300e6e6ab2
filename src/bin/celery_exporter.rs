//! # Celery Exporter
//!
//! Subscribes to the Celery event stream on the configured broker and serves
//! task lifecycle metrics on `/metrics`.
//!
//! Configuration is read from the environment (`BROKER_URL`, `BACKEND_URL`,
//! `MAX_TASKS_CAPTURED`, `PORT`). The process exits with status 1 on a
//! configuration error or when the broker subscription fails.

use std::process;

use anyhow::Context;
use celery_exporter::bootstrap::Exporter;
use celery_exporter::config::ExporterConfig;
use celery_exporter::logging::{init_structured_logging, log_error};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    init_structured_logging();

    if let Err(e) = run().await {
        log_error("celery-exporter", "run", &format!("{e:#}"));
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ExporterConfig::from_env().context("Failed to load exporter configuration")?;
    let exporter = Exporter::new(config).context("Failed to initialize exporter")?;
    let mut source = exporter
        .broker_source()
        .context("Failed to create broker event source")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C; running until the subscription ends");
            std::future::pending::<()>().await;
        }
    };

    exporter
        .run(source.as_mut(), shutdown)
        .await
        .context("Exporter stopped with an error")?;

    info!("👋 Celery exporter stopped");
    Ok(())
}
