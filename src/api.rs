use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{IntGaugeVec, Opts, Registry, TextEncoder, TEXT_FORMAT};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::{ProbeResult, Snapshot};
use crate::snapshot::{self, SnapshotError};

const CACHE_TTL: Duration = Duration::from_secs(5);

/// Serves the persisted snapshot, re-reading the file at most once per TTL.
pub struct ReportState {
    results_path: PathBuf,
    ttl: Duration,
    cache: Mutex<Option<(Instant, Arc<Snapshot>)>>,
}

impl ReportState {
    pub fn new(results_path: PathBuf) -> Self {
        Self::with_ttl(results_path, CACHE_TTL)
    }

    pub fn with_ttl(results_path: PathBuf, ttl: Duration) -> Self {
        Self { results_path, ttl, cache: Mutex::new(None) }
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>, SnapshotError> {
        let mut cache = self.cache.lock().await;
        if let Some((loaded_at, snapshot)) = cache.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(snapshot));
            }
        }
        let snapshot = Arc::new(snapshot::read(&self.results_path).await?);
        *cache = Some((Instant::now(), Arc::clone(&snapshot)));
        Ok(snapshot)
    }
}

pub async fn get_text(State(state): State<Arc<ReportState>>) -> Response {
    match state.snapshot().await {
        Ok(snapshot) => render_text(&snapshot.results).into_response(),
        Err(e) => server_error(e),
    }
}

pub async fn get_metrics(State(state): State<Arc<ReportState>>) -> Response {
    let snapshot = match state.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return server_error(e),
    };
    match render_metrics(&snapshot.results) {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => server_error(e),
    }
}

fn server_error(e: impl std::fmt::Display) -> Response {
    warn!("Server error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
}

pub fn render_text(results: &[ProbeResult]) -> String {
    results
        .iter()
        .map(|r| {
            let time = r.time.to_rfc3339();
            let status = if r.up { "up" } else { "down" };
            match &r.error {
                Some(error) => format!("{}: {} {} (error: {})", time, r.name, status, error),
                None => format!("{}: {} {}", time, r.name, status),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders one gauge family per check. Built fresh per request so targets removed from
/// the snapshot never linger as stale series.
pub fn render_metrics(results: &[ProbeResult]) -> prometheus::Result<String> {
    let registry = Registry::new();

    let up = IntGaugeVec::new(
        Opts::new("uptime_checker", "Whether the target is up (ping and route check)"),
        &["name", "host", "port", "error"],
    )?;
    let ping = IntGaugeVec::new(
        Opts::new("uptime_checker_ping", "Whether the TCP connection succeeded"),
        &["name", "host", "port"],
    )?;
    let traefik = IntGaugeVec::new(
        Opts::new("uptime_checker_traefik", "Whether the route is registered in Traefik"),
        &["name", "host", "port", "route"],
    )?;
    registry.register(Box::new(up.clone()))?;
    registry.register(Box::new(ping.clone()))?;
    if results.iter().any(|r| r.traefik_up.is_some()) {
        registry.register(Box::new(traefik.clone()))?;
    }

    for r in results {
        let port = r.port.to_string();
        let error = r.error.as_deref().unwrap_or("");
        up.with_label_values(&[r.name.as_str(), r.host.as_str(), port.as_str(), error])
            .set(r.up as i64);
        ping.with_label_values(&[r.name.as_str(), r.host.as_str(), port.as_str()])
            .set(r.ping_up as i64);
        if let Some(traefik_up) = r.traefik_up {
            let route = r.traefik_host.as_deref().unwrap_or(&r.name);
            traefik
                .with_label_values(&[r.name.as_str(), r.host.as_str(), port.as_str(), route])
                .set(traefik_up as i64);
        }
    }

    let mut buffer = String::new();
    TextEncoder::new().encode_utf8(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

pub fn create_router(state: Arc<ReportState>) -> Router {
    Router::new()
        .route("/", get(get_text))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, state: Arc<ReportState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Running on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
