use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::config::ProxyConfig;
use crate::models::RouteFetchOutcome;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

const ROUTERS_PATH: &str = "/api/http/routers";

pub fn routers_url(config: &ProxyConfig) -> String {
    format!("{}{}", config.base_url.trim_end_matches('/'), ROUTERS_PATH)
}

/// Fetches the proxy's HTTP routers and returns every router `rule`.
pub async fn fetch_routes(
    client: &reqwest::Client,
    config: &ProxyConfig,
    timeout: Duration,
) -> RouteFetchOutcome {
    let response = client
        .get(routers_url(config))
        .basic_auth(&config.auth_username, Some(&config.auth_password))
        .timeout(timeout)
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(e) => return failure(request_error(&e)),
    };

    let status = response.status();
    if status != StatusCode::OK {
        return failure(format!(
            "{}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        ));
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return failure(request_error(&e)),
    };

    match parse_rules(&body) {
        Ok(route_rules) => RouteFetchOutcome::Success { route_rules },
        Err(e) => failure(format!("invalid route table: {}", e)),
    }
}

fn request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".into()
    } else {
        format!("request failed: {}", e)
    }
}

fn failure(reason: String) -> RouteFetchOutcome {
    RouteFetchOutcome::Failure { reason }
}

/// Routers without a string `rule` are skipped; anything other than a JSON array is rejected.
pub fn parse_rules(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let routers: Vec<Value> = serde_json::from_str(body)?;
    Ok(routers
        .iter()
        .filter_map(|r| r.get("rule").and_then(Value::as_str))
        .map(str::to_owned)
        .collect())
}
