use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod api;
mod config;
mod engine;
mod models;
mod probe;
mod reconcile;
mod snapshot;
mod traefik;

use crate::api::ReportState;
use crate::config::{MonitorConfig, Settings};
use crate::engine::Monitor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .init();

    let settings = Settings::from_env()?;
    let config = MonitorConfig::load(&settings.config_path)?;

    let report_state = Arc::new(ReportState::new(settings.results_path.clone()));
    let report_addr = settings.report_addr;
    tokio::spawn(async move {
        if let Err(e) = api::start_server(report_addr, report_state).await {
            tracing::error!("Report server failed: {:#}", e);
        }
    });

    let monitor = Arc::new(Monitor::new(config, &settings)?);
    tokio::spawn(async move {
        if let Err(e) = monitor.run().await {
            tracing::error!("Monitor engine stopped: {:#}", e);
        }
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping uptime checker...");

    Ok(())
}
