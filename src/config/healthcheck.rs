// ABOUTME: HTTP health probe configuration.
// ABOUTME: Endpoint, polling cadence, retry budget, warm-up period and overall deadline.

use serde::Deserialize;
use std::time::Duration;

use super::RollbackConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Upper bound for the backed-off polling interval.
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,

    /// Per-request timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Warm-up window during which non-ready answers do not use up retries.
    #[serde(default = "default_start_period", with = "humantime_serde")]
    pub start_period: Duration,

    /// Hard limit on the whole probe, warm-up included.
    #[serde(default = "default_deadline", with = "humantime_serde")]
    pub deadline: Duration,

    /// Require readiness (dependencies reachable), not just liveness.
    #[serde(default = "default_require_ready")]
    pub require_ready: bool,
}

impl HealthcheckConfig {
    /// The tighter budget used when verifying a rollback target.
    pub fn for_rollback(&self, rollback: &RollbackConfig) -> HealthcheckConfig {
        HealthcheckConfig {
            retries: rollback.retries.min(self.retries),
            start_period: rollback.start_period.min(self.start_period),
            deadline: rollback.health_deadline.min(self.deadline),
            ..self.clone()
        }
    }
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        HealthcheckConfig {
            path: default_path(),
            interval: default_interval(),
            max_interval: default_max_interval(),
            timeout: default_timeout(),
            retries: default_retries(),
            start_period: default_start_period(),
            deadline: default_deadline(),
            require_ready: default_require_ready(),
        }
    }
}

fn default_path() -> String {
    "/health".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retries() -> u32 {
    5
}

fn default_start_period() -> Duration {
    Duration::from_secs(10)
}

fn default_deadline() -> Duration {
    Duration::from_secs(60)
}

fn default_require_ready() -> bool {
    true
}

/// Optional OpenAPI-style capability endpoint checked after deploy.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSpecConfig {
    #[serde(default = "default_api_spec_path")]
    pub path: String,

    #[serde(default = "default_min_routes")]
    pub min_routes: usize,
}

fn default_api_spec_path() -> String {
    "/openapi.json".to_string()
}

fn default_min_routes() -> usize {
    1
}
