use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::probe;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    pub pings: Vec<ProbeTarget>,
    #[serde(default)]
    pub traefik: Option<ProxyConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTarget {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "port_or_default")]
    pub port: u16,
    #[serde(default)]
    pub traefik: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traefik_host: Option<String>,
}

impl ProbeTarget {
    /// Name the target is expected to appear under in the proxy's route rules.
    pub fn route_name(&self) -> &str {
        self.traefik_host.as_deref().unwrap_or(&self.name)
    }
}

fn default_port() -> u16 { 80 }

/// `null` and `0` fall back to the default port.
fn port_or_default<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u16>::deserialize(deserializer)? {
        None | Some(0) => Ok(default_port()),
        Some(port) => Ok(port),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub base_url: String,
    pub auth_username: String,
    pub auth_password: String,
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: MonitorConfig = serde_json::from_str(content)
            .context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (idx, target) in self.pings.iter().enumerate() {
            if target.name.trim().is_empty() {
                bail!("pings[{}]: name must not be empty", idx);
            }
            if target.host.trim().is_empty() {
                bail!("pings[{}] ({}): host must not be empty", idx, target.name);
            }
        }
        if let Some(proxy) = &self.traefik {
            if proxy.base_url.trim().is_empty() {
                bail!("traefik.baseUrl must not be empty");
            }
        }
        Ok(())
    }

    pub fn needs_routes(&self) -> bool {
        self.pings.iter().any(|t| t.traefik)
    }
}

const DEFAULT_INTERVAL_SECS: u64 = 60;

/// What the scheduler does after a cycle fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Stop scheduling; no further snapshots are written until restart.
    #[default]
    Halt,
    /// Wait the normal interval and run the next cycle.
    Continue,
}

impl std::str::FromStr for CyclePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(CyclePolicy::Halt),
            "continue" => Ok(CyclePolicy::Continue),
            other => bail!("ON_CYCLE_ERROR must be \"halt\" or \"continue\", got {:?}", other),
        }
    }
}

/// Process settings taken from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: Duration,
    pub config_path: PathBuf,
    pub results_path: PathBuf,
    pub probe_timeout: Duration,
    pub cycle_policy: CyclePolicy,
    pub report_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval_secs = match lookup("RUN_INTERVAL") {
            Some(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("RUN_INTERVAL must be a number of seconds, got {:?}", raw)
            })?,
            None => DEFAULT_INTERVAL_SECS,
        };

        let probe_timeout = match lookup("PROBE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse::<u64>().with_context(|| {
                format!("PROBE_TIMEOUT_MS must be a number of milliseconds, got {:?}", raw)
            })?),
            None => probe::DEFAULT_TIMEOUT,
        };

        let cycle_policy = match lookup("ON_CYCLE_ERROR") {
            Some(raw) => raw.parse::<CyclePolicy>()?,
            None => CyclePolicy::default(),
        };

        let report_addr = lookup("REPORT_ADDR").unwrap_or_else(|| "127.0.0.1:8080".into());
        let report_addr = report_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("REPORT_ADDR is not a socket address: {}", report_addr))?;

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            config_path: lookup("PINGS_FILE").unwrap_or_else(|| "pings.json".into()).into(),
            results_path: lookup("PING_RESULTS_FILE")
                .unwrap_or_else(|| "ping-results.json".into())
                .into(),
            probe_timeout,
            cycle_policy,
            report_addr,
        })
    }
}
