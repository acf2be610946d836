// ABOUTME: HTTP health probe with warm-up tolerance, retry budget and overall deadline.
// ABOUTME: Also hosts capability discovery and the best-effort log scan.

mod api_spec;
mod logscan;
mod payload;

pub use api_spec::{ApiSpecError, check_routes};
pub use logscan::{FindingSource, LogFinding, scan_container, scan_lines};
pub use payload::{CheckStatus, HealthPayload};

use parking_lot::Mutex;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use crate::config::HealthcheckConfig;
use crate::http::HttpClient;
use crate::wait::{Attempt, WaitError, Waiter};

/// One observation of the health endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// 200 with a payload satisfying the configured requirement.
    Ready(HealthPayload),
    /// Alive but not (yet) ready, or an unusable answer.
    NotReady(String),
    /// Nothing answering.
    Unreachable(String),
}

impl Observation {
    fn reason(&self) -> String {
        match self {
            Observation::Ready(_) => "ready".to_string(),
            Observation::NotReady(reason) | Observation::Unreachable(reason) => reason.clone(),
        }
    }
}

/// Final answer of [`HealthProbe::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum HealthVerdict {
    Healthy {
        payload: HealthPayload,
        attempts: u32,
        elapsed: Duration,
    },
    /// The retry budget was used up after the warm-up period.
    Unhealthy { reason: String, attempts: u32 },
    /// The overall deadline passed first.
    Timeout {
        reason: String,
        attempts: u32,
        elapsed: Duration,
    },
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy { .. })
    }
}

#[derive(Default)]
struct ProbeState {
    counted_failures: u32,
    last_reason: Option<String>,
}

pub struct HealthProbe {
    config: HealthcheckConfig,
    client: HttpClient,
}

impl HealthProbe {
    pub fn new(config: HealthcheckConfig) -> Self {
        let client = HttpClient::new(config.timeout);
        Self { config, client }
    }

    pub fn config(&self) -> &HealthcheckConfig {
        &self.config
    }

    /// Single request against `address` (`host:port`).
    pub async fn observe(&self, address: &str) -> Observation {
        let response = match self.client.get(address, &self.config.path).await {
            Ok(response) => response,
            Err(e) => return Observation::Unreachable(e.to_string()),
        };

        if response.status != 200 {
            return Observation::NotReady(format!("HTTP {}", response.status));
        }

        let payload: HealthPayload = match response.json() {
            Ok(payload) => payload,
            Err(_) => {
                return Observation::NotReady("response has no JSON status field".to_string());
            }
        };

        if !payload.is_live() {
            return Observation::NotReady(format!("status is {:?}", payload.status));
        }
        if self.config.require_ready && !payload.is_ready() {
            let failing = payload.failing_checks();
            let reason = if failing.is_empty() {
                format!("not ready (status {:?})", payload.status)
            } else {
                format!("not ready: {} unreachable", failing.join(", "))
            };
            return Observation::NotReady(reason);
        }

        Observation::Ready(payload)
    }

    /// Poll until ready, the retry budget is spent, or the deadline passes.
    ///
    /// Failures observed during `start_period` are not counted.
    pub async fn poll(&self, address: &str) -> HealthVerdict {
        let started = Instant::now();
        let state = Mutex::new(ProbeState::default());
        let waiter = Waiter::for_healthcheck(&self.config);

        let result = waiter
            .until(|attempt| {
                let state = &state;
                async move {
                    let observation = self.observe(address).await;
                    tracing::debug!(attempt, %address, ?observation, "health probe");

                    if let Observation::Ready(payload) = observation {
                        return Ok::<_, Infallible>(Attempt::Done(HealthVerdict::Healthy {
                            payload,
                            attempts: attempt,
                            elapsed: started.elapsed(),
                        }));
                    }

                    let mut state = state.lock();
                    state.last_reason = Some(observation.reason());
                    if started.elapsed() < self.config.start_period {
                        return Ok(Attempt::Retry);
                    }

                    state.counted_failures += 1;
                    if state.counted_failures >= self.config.retries.max(1) {
                        return Ok(Attempt::Done(HealthVerdict::Unhealthy {
                            reason: observation.reason(),
                            attempts: attempt,
                        }));
                    }
                    Ok(Attempt::Retry)
                }
            })
            .await;

        match result {
            Ok(verdict) => verdict,
            Err(WaitError::TimedOut { elapsed, attempts }) => HealthVerdict::Timeout {
                reason: state
                    .lock()
                    .last_reason
                    .take()
                    .unwrap_or_else(|| "no response".to_string()),
                attempts,
                elapsed,
            },
            Err(WaitError::Aborted(never)) => match never {},
        }
    }
}
