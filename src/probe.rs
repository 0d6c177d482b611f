use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::ProbeTarget;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Connection(String),
}

/// Opens a TCP connection to `host:port` and closes it as soon as it is established.
///
/// The connect future is dropped when the deadline passes, which releases any socket it
/// had created, so nothing outlives the call on any exit path.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> Result<Duration, ProbeError> {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed();
            drop(stream);
            Ok(elapsed)
        }
        Ok(Err(e)) => Err(ProbeError::Connection(e.to_string())),
        Err(_) => Err(ProbeError::Timeout),
    }
}

/// A single probe of one target, timed from start to resolution.
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub time: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: Result<(), ProbeError>,
}

pub async fn attempt(target: &ProbeTarget, timeout: Duration) -> ProbeAttempt {
    let start = Instant::now();
    let (elapsed, outcome) = match probe(&target.host, target.port, timeout).await {
        Ok(elapsed) => (elapsed, Ok(())),
        Err(e) => (start.elapsed(), Err(e)),
    };
    ProbeAttempt {
        time: Utc::now(),
        elapsed,
        outcome,
    }
}
