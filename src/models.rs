use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub traefik: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traefik_host: Option<String>,
    pub time: DateTime<Utc>,
    /// Probe duration in milliseconds.
    pub duration: u64,
    pub ping_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traefik_up: Option<bool>,
    pub up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub results: Vec<ProbeResult>,
}

impl Snapshot {
    /// Builds a snapshot ordered succeeded-then-failed, keeping input order inside each group.
    pub fn from_results(results: Vec<ProbeResult>) -> Self {
        let (mut succeeded, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.up);
        succeeded.extend(failed);
        Self { results: succeeded }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.up).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Outcome of the single route table fetch made per cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteFetchOutcome {
    Success { route_rules: Vec<String> },
    Failure { reason: String },
}
