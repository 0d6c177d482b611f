use anyhow::{Context, Result};
use futures::future::join_all;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{CyclePolicy, MonitorConfig, Settings};
use crate::models::{RouteFetchOutcome, Snapshot};
use crate::{probe, reconcile, snapshot, traefik};

pub struct Monitor {
    config: MonitorConfig,
    results_path: PathBuf,
    interval: Duration,
    policy: CyclePolicy,
    probe_timeout: Duration,
    fetch_timeout: Duration,
    http_client: reqwest::Client,
}

impl Monitor {
    pub fn new(config: MonitorConfig, settings: &Settings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            results_path: settings.results_path.clone(),
            interval: settings.interval,
            policy: settings.cycle_policy,
            probe_timeout: settings.probe_timeout,
            fetch_timeout: traefik::DEFAULT_TIMEOUT,
            http_client,
        })
    }

    /// Runs cycles back to back with a fixed delay between them. Returns only when a
    /// failed cycle is met with [`CyclePolicy::Halt`].
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            "Starting uptime checker: {} targets, checking every {}s",
            self.config.pings.len(),
            self.interval.as_secs()
        );
        if let Some(proxy) = &self.config.traefik {
            info!(
                "Traefik verification via {} ({} configured hosts)",
                proxy.base_url,
                proxy.hosts.len()
            );
        }

        loop {
            if let Err(e) = self.run_cycle().await {
                error!("Error running pings: {:#}", e);
                if self.after_failure().is_break() {
                    return Err(e);
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    fn after_failure(&self) -> ControlFlow<()> {
        match self.policy {
            CyclePolicy::Halt => {
                error!("Scheduling halted; no further cycles will run until restart");
                ControlFlow::Break(())
            }
            CyclePolicy::Continue => ControlFlow::Continue(()),
        }
    }

    /// One cycle: route fetch, concurrent probes, reconciliation, snapshot write.
    pub async fn run_cycle(&self) -> Result<Snapshot> {
        let start = Instant::now();
        let targets = &self.config.pings;
        info!("Running {} pings", targets.len());

        let routes = self.fetch_routes().await;

        let tasks = targets.iter().cloned().map(|target| {
            let timeout = self.probe_timeout;
            tokio::spawn(async move { probe::attempt(&target, timeout).await })
        });
        let attempts = join_all(tasks).await;

        let mut results = Vec::with_capacity(targets.len());
        for (target, attempt) in targets.iter().zip(attempts) {
            let attempt =
                attempt.with_context(|| format!("Probe task for {} failed", target.name))?;
            let result = reconcile::reconcile(target, &attempt, routes.as_ref());
            debug!(
                "{} ({}:{}) up={} ping={} traefik={:?} error={:?}",
                result.name, result.host, result.port, result.up, result.ping_up,
                result.traefik_up, result.error
            );
            results.push(result);
        }

        let snapshot = Snapshot::from_results(results);
        snapshot::write(&self.results_path, &snapshot).await?;

        info!(
            "Finished running {} pings in {:.2}s. {} succeeded, {} failed",
            targets.len(),
            start.elapsed().as_secs_f64(),
            snapshot.succeeded(),
            snapshot.failed()
        );
        Ok(snapshot)
    }

    async fn fetch_routes(&self) -> Option<RouteFetchOutcome> {
        let proxy = self.config.traefik.as_ref()?;
        if !self.config.needs_routes() {
            return None;
        }
        let outcome = traefik::fetch_routes(&self.http_client, proxy, self.fetch_timeout).await;
        match &outcome {
            RouteFetchOutcome::Success { route_rules } => {
                debug!("Fetched {} route rules", route_rules.len())
            }
            RouteFetchOutcome::Failure { reason } => {
                warn!("Failed to fetch traefik routes: {}", reason)
            }
        }
        Some(outcome)
    }
}
