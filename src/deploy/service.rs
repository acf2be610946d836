// ABOUTME: Starts, stops and restarts the managed service's containers.
// ABOUTME: The primary service runs blue/green slots; auxiliary services restart in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use super::DeployError;
use super::lock::DeploymentLock;
use super::platform::Platform;
use crate::config::{AuxServiceConfig, resolve_env_map};
use crate::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerState,
    HealthState, PortMapping, RestartPolicyConfig,
};
use crate::types::{CommitHash, ContainerId, Slot};
use crate::vcs::ReleaseTag;
use crate::wait::{Attempt, WaitError, Waiter};

pub const LABEL_SERVICE: &str = "releasegate.service";
pub const LABEL_ENVIRONMENT: &str = "releasegate.environment";
pub const LABEL_ROLE: &str = "releasegate.role";
pub const LABEL_SLOT: &str = "releasegate.slot";
pub const LABEL_TAG: &str = "releasegate.tag";
pub const LABEL_COMMIT: &str = "releasegate.commit";

const ROLE_PRIMARY: &str = "primary";
const ROLE_AUX: &str = "aux";

const STARTUP_DEADLINE: Duration = Duration::from_secs(30);
const STARTUP_INTERVAL: Duration = Duration::from_millis(250);

/// A primary-service container in one of the slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub container: ContainerId,
    pub slot: Slot,
    pub tag: Option<String>,
    pub commit: Option<CommitHash>,
    pub running: bool,
}

impl Instance {
    pub fn runs(&self, commit: &CommitHash) -> bool {
        self.running && self.commit.as_ref().is_some_and(|c| c.matches(commit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Starting,
    Healthy,
    Unhealthy,
    Unknown,
}

/// Read model over the runtime; never constructed by the pipeline itself.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceState {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    pub health: ServiceHealth,
    pub restart_count: u32,
    pub last_checked_at: DateTime<Utc>,
}

impl ServiceState {
    fn observe(service: String, slot: Option<Slot>, info: &ContainerInfo) -> Self {
        let health = match (info.state, info.health) {
            (ContainerState::Running, Some(HealthState::Healthy)) => ServiceHealth::Healthy,
            (ContainerState::Running, Some(HealthState::Starting)) => ServiceHealth::Starting,
            (ContainerState::Running, Some(HealthState::Unhealthy)) => ServiceHealth::Unhealthy,
            (ContainerState::Running, _) => ServiceHealth::Unknown,
            (ContainerState::Created | ContainerState::Restarting, _) => ServiceHealth::Starting,
            _ => ServiceHealth::Unhealthy,
        };
        Self {
            service,
            slot,
            health,
            restart_count: info.restart_count,
            last_checked_at: Utc::now(),
        }
    }
}

/// What happened to the auxiliary services during a restart.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuxRestart {
    pub restarted: Vec<String>,
    pub unchanged: Vec<String>,
    /// Optional services that failed, with the reason.
    pub degraded: Vec<(String, String)>,
}

/// Result of live-instance discovery.
#[derive(Debug, Clone, Default)]
pub struct LiveInstance {
    pub instance: Option<Instance>,
    /// Why discovery fell back to container state instead of the proxy.
    pub fallback: Option<String>,
}

pub struct ServiceController<'a> {
    platform: &'a Platform,
}

impl<'a> ServiceController<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    fn service(&self) -> &str {
        self.platform.config.service.as_str()
    }

    /// `host:port` a slot is reachable on from here.
    pub fn address(&self, slot: Slot) -> String {
        let slots = &self.platform.config.slots;
        format!("{}:{}", slots.host, slot.port(slots))
    }

    /// `host:port` the proxy dials for a slot.
    pub fn dial(&self, slot: Slot) -> String {
        let config = &self.platform.config;
        format!("{}:{}", config.upstream_host(), slot.port(&config.slots))
    }

    fn base_filters(&self, role: &str) -> ContainerFilters {
        ContainerFilters::default()
            .label(LABEL_SERVICE, self.service())
            .label(LABEL_ENVIRONMENT, self.platform.config.environment.as_str())
            .label(LABEL_ROLE, role)
            .including_stopped()
    }

    fn labels(&self, role: &str, release: &ReleaseTag) -> HashMap<String, String> {
        let config = &self.platform.config;
        let mut labels = config.labels.clone();
        labels.insert(LABEL_SERVICE.to_string(), self.service().to_string());
        labels.insert(LABEL_ENVIRONMENT.to_string(), config.environment.clone());
        labels.insert(LABEL_ROLE.to_string(), role.to_string());
        labels.insert(LABEL_TAG.to_string(), release.name.to_string());
        labels.insert(LABEL_COMMIT.to_string(), release.commit.to_string());
        labels
    }

    /// All primary-service containers, running or not.
    pub async fn primary_instances(&self) -> Result<Vec<Instance>, DeployError> {
        let containers = self
            .platform
            .runtime
            .list_containers(&self.base_filters(ROLE_PRIMARY))
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let slot = c.labels.get(LABEL_SLOT)?.parse::<Slot>().ok()?;
                Some(Instance {
                    container: c.id,
                    slot,
                    tag: c.labels.get(LABEL_TAG).cloned(),
                    commit: c
                        .labels
                        .get(LABEL_COMMIT)
                        .and_then(|s| CommitHash::new(s).ok()),
                    running: c.state == ContainerState::Running,
                })
            })
            .collect())
    }

    /// The instance currently serving traffic: the one whose slot the proxy
    /// dials, otherwise the only running primary container.
    pub async fn live_instance(&self) -> Result<LiveInstance, DeployError> {
        let running: Vec<Instance> = self
            .primary_instances()
            .await?
            .into_iter()
            .filter(|i| i.running)
            .collect();

        let fallback = match self.platform.proxy.upstreams().await {
            Ok(upstreams) => {
                let slots = &self.platform.config.slots;
                let routed = upstreams
                    .iter()
                    .filter_map(|u| u.port())
                    .find_map(|port| Slot::for_port(port, slots));
                if let Some(slot) = routed
                    && let Some(instance) = running.iter().find(|i| i.slot == slot)
                {
                    return Ok(LiveInstance {
                        instance: Some(instance.clone()),
                        fallback: None,
                    });
                }
                (!running.is_empty()).then(|| "proxy does not route to a running slot".to_string())
            }
            Err(e) => Some(format!("cannot read proxy upstreams: {e}")),
        };

        if let Some(reason) = &fallback {
            tracing::warn!("{}, using container state", reason);
        }

        match running.len() {
            0 => Ok(LiveInstance {
                instance: None,
                fallback,
            }),
            1 => Ok(LiveInstance {
                instance: running.into_iter().next(),
                fallback,
            }),
            _ => Err(DeployError::service(
                self.service(),
                "both slots are running and the proxy does not identify the live one",
            )),
        }
    }

    /// Start `release` in the slot not used by `live`, without touching live traffic.
    pub async fn start_alternate(
        &self,
        _lock: &DeploymentLock,
        release: &ReleaseTag,
        live: Option<&Instance>,
    ) -> Result<Instance, DeployError> {
        let slot = live.map(|i| i.slot.other()).unwrap_or(Slot::Blue);
        self.clear_slot(slot).await?;

        let id = self.create_primary(release, slot).await?;
        let started = match self.platform.runtime.start_container(&id).await {
            Ok(()) => self.wait_running(self.service(), &id).await,
            Err(e) => Err(DeployError::service(self.service(), format!("start failed: {e}"))),
        };
        if let Err(e) = started {
            if let Err(remove) = self.platform.runtime.remove_container(&id, true).await {
                tracing::warn!("failed to remove candidate {}: {}", id.short(), remove);
            }
            return Err(e);
        }

        tracing::info!("started {} {} in {} slot", self.service(), release.name, slot);
        Ok(Instance {
            container: id,
            slot,
            tag: Some(release.name.to_string()),
            commit: Some(release.commit.clone()),
            running: true,
        })
    }

    /// Recreate `slot` on `release` and leave it stopped, so both slots hold
    /// the same revision.
    pub async fn rebuild_idle(
        &self,
        _lock: &DeploymentLock,
        release: &ReleaseTag,
        slot: Slot,
    ) -> Result<(), DeployError> {
        self.clear_slot(slot).await?;
        self.create_primary(release, slot).await?;
        tracing::debug!("rebuilt idle {} slot on {}", slot, release.name);
        Ok(())
    }

    /// Graceful stop: termination signal, then a forced kill after `grace`.
    pub async fn stop(&self, instance: &Instance, grace: Duration) -> Result<(), DeployError> {
        let signal = self.platform.config.stop.signal.as_str();
        self.platform
            .runtime
            .stop_container(&instance.container, grace, Some(signal))
            .await
            .map_err(|e| DeployError::service(self.service(), format!("stop failed: {e}")))
    }

    pub async fn remove(&self, instance: &Instance) -> Result<(), DeployError> {
        match self
            .platform
            .runtime
            .remove_container(&instance.container, true)
            .await
        {
            Ok(()) | Err(ContainerError::NotFound(_)) => Ok(()),
            Err(e) => Err(DeployError::service(self.service(), e)),
        }
    }

    /// Restart every auxiliary service onto `release`. Services already
    /// running the release's commit are left alone.
    pub async fn restart_aux(
        &self,
        _lock: &DeploymentLock,
        release: &ReleaseTag,
    ) -> Result<AuxRestart, DeployError> {
        let mut outcome = AuxRestart::default();

        for aux in &self.platform.config.services {
            let name = aux.name.to_string();
            match self.restart_one(aux, release).await {
                Ok(true) => outcome.restarted.push(name),
                Ok(false) => outcome.unchanged.push(name),
                Err(e) if !aux.required => {
                    tracing::warn!("optional service {} failed to restart: {}", name, e);
                    outcome.degraded.push((name, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    async fn restart_one(
        &self,
        aux: &AuxServiceConfig,
        release: &ReleaseTag,
    ) -> Result<bool, DeployError> {
        let runtime = &self.platform.runtime;
        let name = aux.name.as_str();
        let filters = self
            .base_filters(ROLE_AUX)
            .label(LABEL_SLOT, name);
        let existing = runtime.list_containers(&filters).await?;

        let current = existing.iter().any(|c| {
            c.state == ContainerState::Running
                && c.labels
                    .get(LABEL_COMMIT)
                    .and_then(|s| CommitHash::new(s).ok())
                    .is_some_and(|commit| commit.matches(&release.commit))
        });
        if current {
            tracing::debug!("{} already runs {}", name, release.commit.short());
            return Ok(false);
        }

        for container in &existing {
            let _ = runtime
                .stop_container(&container.id, self.platform.config.stop.timeout, None)
                .await;
            runtime
                .remove_container(&container.id, true)
                .await
                .map_err(|e| DeployError::service(name, e))?;
        }

        let config = &self.platform.config;
        let mut env = resolve_env_map(&config.env).map_err(|e| DeployError::service(name, e))?;
        env.extend(resolve_env_map(&aux.env).map_err(|e| DeployError::service(name, e))?);

        let mut labels = self.labels(ROLE_AUX, release);
        // Aux services are addressed by name through the slot label.
        labels.insert(LABEL_SLOT.to_string(), name.to_string());

        let container = ContainerConfig {
            name: config.service.container_name(&config.environment, name),
            image: self.platform.image_for(&release.name),
            env,
            labels,
            ports: Vec::new(),
            command: aux.command.clone().or_else(|| config.command.clone()),
            restart_policy: RestartPolicyConfig::UnlessStopped,
            stop_timeout: Some(config.stop.timeout),
            network: config.network.clone(),
        };

        let id = runtime
            .create_container(&container)
            .await
            .map_err(|e| DeployError::service(name, e))?;
        runtime
            .start_container(&id)
            .await
            .map_err(|e| DeployError::service(name, e))?;
        self.wait_running(name, &id).await?;

        tracing::info!("restarted {} on {}", name, release.name);
        Ok(true)
    }

    /// Health, restart count and last check for every managed container.
    pub async fn service_states(&self) -> Result<Vec<ServiceState>, DeployError> {
        let runtime = &self.platform.runtime;
        let mut states = Vec::new();

        for role in [ROLE_PRIMARY, ROLE_AUX] {
            for summary in runtime.list_containers(&self.base_filters(role)).await? {
                let info = runtime.inspect_container(&summary.id).await?;
                let label = summary.labels.get(LABEL_SLOT).cloned();
                let (service, slot) = if role == ROLE_PRIMARY {
                    (
                        self.service().to_string(),
                        label.and_then(|s| s.parse().ok()),
                    )
                } else {
                    (label.unwrap_or_else(|| summary.name.clone()), None)
                };
                // Idle primary slots are expected to be stopped.
                if role == ROLE_PRIMARY && !info.is_running() {
                    continue;
                }
                states.push(ServiceState::observe(service, slot, &info));
            }
        }

        Ok(states)
    }

    async fn clear_slot(&self, slot: Slot) -> Result<(), DeployError> {
        for stale in self
            .primary_instances()
            .await?
            .into_iter()
            .filter(|i| i.slot == slot)
        {
            tracing::debug!("removing stale {} container {}", slot, stale.container.short());
            if stale.running {
                let _ = self.stop(&stale, self.platform.config.stop.timeout).await;
            }
            self.remove(&stale).await?;
        }
        Ok(())
    }

    async fn create_primary(&self, release: &ReleaseTag, slot: Slot) -> Result<ContainerId, DeployError> {
        let config = &self.platform.config;
        let env = resolve_env_map(&config.env).map_err(|e| DeployError::service(self.service(), e))?;

        let mut labels = self.labels(ROLE_PRIMARY, release);
        labels.insert(LABEL_SLOT.to_string(), slot.to_string());

        let container = ContainerConfig {
            name: config.service.container_name(&config.environment, slot),
            image: self.platform.image_for(&release.name),
            env,
            labels,
            ports: vec![PortMapping {
                host_port: slot.port(&config.slots),
                container_port: config.slots.container_port,
                host_ip: Some(config.slots.host.clone()),
            }],
            command: config.command.clone(),
            restart_policy: RestartPolicyConfig::UnlessStopped,
            stop_timeout: Some(config.stop.timeout),
            network: config.network.clone(),
        };

        self.platform
            .runtime
            .create_container(&container)
            .await
            .map_err(|e| DeployError::service(self.service(), format!("create failed: {e}")))
    }

    /// Wait until the container is running; fail fast if it exits.
    async fn wait_running(&self, service: &str, id: &ContainerId) -> Result<(), DeployError> {
        let waiter = Waiter::new(STARTUP_DEADLINE, STARTUP_INTERVAL);
        let result = waiter
            .until(|_| async move {
                let info = self.platform.runtime.inspect_container(id).await?;
                match info.state {
                    ContainerState::Running => Ok(Attempt::Done(())),
                    ContainerState::Exited | ContainerState::Dead => {
                        Err(ContainerError::NotRunning(format!(
                            "{} exited during startup",
                            info.name
                        )))
                    }
                    _ => Ok(Attempt::Retry),
                }
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(WaitError::Aborted(e)) => Err(DeployError::service(service, e)),
            Err(WaitError::TimedOut { elapsed, .. }) => Err(DeployError::service(
                service,
                format!("not running after {:?}", elapsed),
            )),
        }
    }
}
