use crate::config::ProbeTarget;
use crate::models::{ProbeResult, RouteFetchOutcome};
use crate::probe::ProbeAttempt;

pub const ROUTE_NOT_FOUND: &str = "route not found";
pub const PROXY_NOT_CONFIGURED: &str = "traefik is not configured";

/// Merges a target's probe attempt with the cycle's route table into one verdict.
///
/// `routes` is `None` when no proxy is configured. When both checks fail the route
/// error replaces the ping error.
pub fn reconcile(
    target: &ProbeTarget,
    attempt: &ProbeAttempt,
    routes: Option<&RouteFetchOutcome>,
) -> ProbeResult {
    let ping_up = attempt.outcome.is_ok();
    let mut error = attempt.outcome.as_ref().err().map(ToString::to_string);

    let traefik_up = if target.traefik {
        let (found, route_error) = verify_route(target.route_name(), routes);
        if route_error.is_some() {
            error = route_error;
        }
        Some(found)
    } else {
        None
    };

    ProbeResult {
        name: target.name.clone(),
        host: target.host.clone(),
        port: target.port,
        traefik: target.traefik,
        traefik_host: target.traefik_host.clone(),
        time: attempt.time,
        duration: attempt.elapsed.as_millis() as u64,
        ping_up,
        traefik_up,
        up: ping_up && traefik_up.unwrap_or(true),
        error,
    }
}

fn verify_route(route_name: &str, routes: Option<&RouteFetchOutcome>) -> (bool, Option<String>) {
    match routes {
        Some(RouteFetchOutcome::Success { route_rules }) => {
            if route_rules.iter().any(|rule| rule.contains(route_name)) {
                (true, None)
            } else {
                (false, Some(ROUTE_NOT_FOUND.into()))
            }
        }
        Some(RouteFetchOutcome::Failure { reason }) => (false, Some(reason.clone())),
        None => (false, Some(PROXY_NOT_CONFIGURED.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use chrono::Utc;
    use std::time::Duration;

    fn target(name: &str, traefik: bool, traefik_host: Option<&str>) -> ProbeTarget {
        ProbeTarget {
            name: name.into(),
            host: "10.0.0.2".into(),
            port: 443,
            traefik,
            traefik_host: traefik_host.map(Into::into),
        }
    }

    fn reachable() -> ProbeAttempt {
        ProbeAttempt { time: Utc::now(), elapsed: Duration::from_millis(12), outcome: Ok(()) }
    }

    fn refused() -> ProbeAttempt {
        ProbeAttempt {
            time: Utc::now(),
            elapsed: Duration::from_millis(3),
            outcome: Err(ProbeError::Connection("Connection refused (os error 111)".into())),
        }
    }

    fn routes(rules: &[&str]) -> RouteFetchOutcome {
        RouteFetchOutcome::Success { route_rules: rules.iter().map(|r| r.to_string()).collect() }
    }

    #[test]
    fn plain_target_follows_ping() {
        let up = reconcile(&target("db", false, None), &reachable(), None);
        assert!(up.ping_up && up.up);
        assert_eq!(up.traefik_up, None);
        assert_eq!(up.error, None);
        assert_eq!(up.duration, 12);

        let down = reconcile(&target("api", false, None), &refused(), Some(&routes(&[])));
        assert!(!down.ping_up && !down.up);
        assert_eq!(down.traefik_up, None);
        assert!(down.error.unwrap().contains("refused"));
    }

    #[test]
    fn route_found_by_substring() {
        let result = reconcile(
            &target("web", true, None),
            &reachable(),
            Some(&routes(&["Host(`api.example.com`)", "Host(`web.example.com`)"])),
        );
        assert_eq!(result.traefik_up, Some(true));
        assert!(result.up);
        assert_eq!(result.error, None);
    }

    #[test]
    fn route_match_is_case_sensitive() {
        let upper = routes(&["Host(`WEB`)"]);
        let result = reconcile(&target("web", true, None), &reachable(), Some(&upper));
        assert_eq!(result.traefik_up, Some(false));
        assert!(result.ping_up);
        assert!(!result.up);
        assert_eq!(result.error.as_deref(), Some(ROUTE_NOT_FOUND));
    }

    #[test]
    fn traefik_host_overrides_name() {
        let t = target("web", true, Some("shop.example.com"));
        let found = reconcile(&t, &reachable(), Some(&routes(&["Host(`shop.example.com`)"])));
        assert_eq!(found.traefik_up, Some(true));

        let missing = reconcile(&t, &reachable(), Some(&routes(&["Host(`web.example.com`)"])));
        assert_eq!(missing.traefik_up, Some(false));
    }

    #[test]
    fn fetch_failure_propagates_reason() {
        let failed = RouteFetchOutcome::Failure { reason: "503: Service Unavailable".into() };
        let result = reconcile(&target("web", true, None), &reachable(), Some(&failed));
        assert_eq!(result.traefik_up, Some(false));
        assert!(!result.up);
        assert!(result.error.unwrap().contains("503: Service Unavailable"));
    }

    #[test]
    fn route_error_overrides_ping_error() {
        let result = reconcile(&target("web", true, None), &refused(), Some(&routes(&[])));
        assert!(!result.ping_up);
        assert_eq!(result.traefik_up, Some(false));
        assert_eq!(result.error.as_deref(), Some(ROUTE_NOT_FOUND));
    }

    #[test]
    fn ping_error_kept_when_route_is_found() {
        let found = routes(&["Host(`web`)"]);
        let result = reconcile(&target("web", true, None), &refused(), Some(&found));
        assert_eq!(result.traefik_up, Some(true));
        assert!(!result.up);
        assert!(result.error.unwrap().contains("refused"));
    }

    #[test]
    fn missing_proxy_config_fails_route_check() {
        let result = reconcile(&target("web", true, None), &reachable(), None);
        assert_eq!(result.traefik_up, Some(false));
        assert_eq!(result.error.as_deref(), Some(PROXY_NOT_CONFIGURED));
    }

    #[test]
    fn up_is_and_of_both_checks() {
        let t = target("web", true, None);
        let found = routes(&["Host(`web`)"]);
        let missing = routes(&[]);
        for (attempt, routes) in [
            (reachable(), &found),
            (reachable(), &missing),
            (refused(), &found),
            (refused(), &missing),
        ] {
            let r = reconcile(&t, &attempt, Some(routes));
            assert_eq!(r.up, r.ping_up && r.traefik_up == Some(true));
        }
    }
}
