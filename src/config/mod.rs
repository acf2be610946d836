// ABOUTME: Configuration types and parsing for releasegate.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and per-environment overlays.

mod build;
mod env_value;
mod healthcheck;
mod init;
mod proxy;
mod service;
mod stop;
mod validation;

pub use build::{BuildConfig, SmokeCheck, SmokeConfig};
pub use env_value::{EnvValue, resolve_env_map};
pub use healthcheck::{ApiSpecConfig, HealthcheckConfig};
pub use init::init_config;
pub use proxy::ProxyConfig;
pub use service::{AuxServiceConfig, SlotsConfig};
pub use stop::{StopConfig, StopSignal};
pub use validation::{RuntimeRequirement, ValidationConfig};

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::types::{ImageRef, ServiceName};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "releasegate.yml";
pub const CONFIG_FILENAME_ALT: &str = "releasegate.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".releasegate/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceName,

    /// Image repository; the release tag becomes the image tag.
    pub image: ImageRef,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Where records, history, drift reports and the lock live.
    /// Relative paths are resolved against the workspace.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    pub slots: SlotsConfig,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub healthcheck: HealthcheckConfig,

    #[serde(default)]
    pub api_spec: Option<ApiSpecConfig>,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub smoke: SmokeConfig,

    #[serde(default)]
    pub services: Vec<AuxServiceConfig>,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub rollback: RollbackConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub stop: StopConfig,

    #[serde(default)]
    pub logs: LogScanConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverlay>,
}

/// Per-environment overrides merged over the base config.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnvironmentOverlay {
    #[serde(default)]
    pub slots: Option<SlotsConfig>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub healthcheck: Option<HealthcheckConfig>,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollbackConfig {
    #[serde(default = "default_rollback_deadline", with = "humantime_serde")]
    pub health_deadline: Duration,

    #[serde(default = "default_rollback_retries")]
    pub retries: u32,

    #[serde(default = "default_rollback_start_period", with = "humantime_serde")]
    pub start_period: Duration,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        RollbackConfig {
            health_deadline: default_rollback_deadline(),
            retries: default_rollback_retries(),
            start_period: default_rollback_start_period(),
        }
    }
}

fn default_rollback_deadline() -> Duration {
    Duration::from_secs(30)
}

fn default_rollback_retries() -> u32 {
    3
}

fn default_rollback_start_period() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Drain period for the previous instance after traffic moves.
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,

    /// Recreate the drained slot on the new revision (left stopped) so both
    /// slots are symmetric for the next cycle.
    #[serde(default)]
    pub rebuild_idle_slot: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig {
            grace_period: default_grace_period(),
            rebuild_idle_slot: false,
        }
    }
}

fn default_grace_period() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogScanConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_log_tail")]
    pub tail: u64,
}

impl Default for LogScanConfig {
    fn default() -> Self {
        LogScanConfig {
            enabled: true,
            tail: default_log_tail(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_tail() -> u64 {
    200
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".releasegate/state")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        candidates
            .iter()
            .find(|path| path.exists())
            .map(|path| Self::load(path))
            .unwrap_or_else(|| Err(Error::ConfigNotFound(dir.to_path_buf())))
    }

    /// Apply the named environment overlay.
    pub fn for_environment(&self, name: &str) -> Result<Config> {
        let overlay = self
            .environments
            .get(name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;

        let mut merged = self.clone();
        merged.environment = name.to_string();

        if let Some(ref slots) = overlay.slots {
            merged.slots = slots.clone();
        }

        for (k, v) in &overlay.env {
            merged.env.insert(k.clone(), v.clone());
        }

        for (k, v) in &overlay.labels {
            merged.labels.insert(k.clone(), v.clone());
        }

        if let Some(ref healthcheck) = overlay.healthcheck {
            merged.healthcheck = healthcheck.clone();
        }

        if let Some(ref proxy) = overlay.proxy {
            merged.proxy = proxy.clone();
        }

        if overlay.network.is_some() {
            merged.network = overlay.network.clone();
        }

        Ok(merged)
    }

    /// State directory for the selected environment.
    pub fn environment_state_dir(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.state_dir).join(&self.environment)
    }

    /// Host used when the proxy dials a slot.
    pub fn upstream_host(&self) -> &str {
        self.proxy
            .upstream_host
            .as_deref()
            .unwrap_or(&self.slots.host)
    }

    pub fn template() -> Result<Self> {
        Ok(Config {
            service: ServiceName::new("my-app").map_err(|e| Error::InvalidConfig(e.to_string()))?,
            image: ImageRef::parse("registry.example.com/my-app")
                .map_err(|e| Error::InvalidConfig(e.to_string()))?,
            environment: default_environment(),
            state_dir: default_state_dir(),
            slots: SlotsConfig {
                host: "127.0.0.1".to_string(),
                container_port: 8000,
                blue: 8001,
                green: 8002,
            },
            env: HashMap::new(),
            labels: HashMap::new(),
            command: None,
            network: None,
            healthcheck: HealthcheckConfig::default(),
            api_spec: None,
            validation: ValidationConfig::default(),
            build: BuildConfig::default(),
            smoke: SmokeConfig::default(),
            services: Vec::new(),
            proxy: ProxyConfig::default(),
            rollback: RollbackConfig::default(),
            cleanup: CleanupConfig::default(),
            stop: StopConfig::default(),
            logs: LogScanConfig::default(),
            runtime: RuntimeConfig::default(),
            environments: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_dir_is_scoped_by_environment() {
        let mut config = Config::template().unwrap();
        config.environment = "staging".to_string();
        assert_eq!(
            config.environment_state_dir(Path::new("/srv/app")),
            PathBuf::from("/srv/app/.releasegate/state/staging")
        );
    }

    #[test]
    fn upstream_host_falls_back_to_slot_host() {
        let mut config = Config::template().unwrap();
        assert_eq!(config.upstream_host(), "127.0.0.1");
        config.proxy.upstream_host = Some("app-net".to_string());
        assert_eq!(config.upstream_host(), "app-net");
    }

    #[test]
    fn rollback_health_budget_is_never_longer() {
        let config = Config::template().unwrap();
        let rollback = config.healthcheck.for_rollback(&config.rollback);
        assert!(rollback.deadline <= config.healthcheck.deadline);
        assert!(rollback.retries <= config.healthcheck.retries);
    }
}
