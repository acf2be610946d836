// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks to Docker or Podman through the Docker-compatible API socket.

use crate::runtime::error::{ConnectionSnafu, RuntimeError};
use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, HealthState, ImageError, ImageOps, LogError, LogLine, LogLineStream, LogOps,
    LogOptions, LogStream, RestartPolicyConfig,
};
use crate::runtime::types::RuntimeInfo;
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    LogsOptions, RemoveContainerOptions, StopContainerOptions,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use snafu::ResultExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_container_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => match *status_code {
            404 => ContainerError::NotFound(message.clone()),
            409 => ContainerError::AlreadyExists(message.clone()),
            304 => ContainerError::NotRunning(message.clone()),
            _ => ContainerError::Runtime(e.to_string()),
        },
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => ContainerError::ImageNotFound(message.clone()),
        _ => map_container_error(e),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Connect to a detected runtime and verify it answers.
    pub async fn connect(info: &RuntimeInfo) -> Result<Self, RuntimeError> {
        let context = || ConnectionSnafu {
            runtime: info.runtime_type,
            socket: info.socket_path.clone(),
        };

        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .with_context(|_| context())?;
        client.ping().await.with_context(|_| context())?;

        tracing::debug!("connected to {} at {}", info.runtime_type, info.docker_host());
        Ok(Self::new(client))
    }
}

fn restart_policy(policy: &RestartPolicyConfig) -> RestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicyConfig::No => (RestartPolicyNameEnum::NO, None),
        RestartPolicyConfig::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicyConfig::OnFailure { max_retries } => (
            RestartPolicyNameEnum::ON_FAILURE,
            max_retries.map(|r| r as i64),
        ),
    };
    RestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        // The API reports never-started containers as year 1.
        .filter(|dt| dt.timestamp() > 0)
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| ImageError::PullFailed(format!("{}: {}", image_name, e)))?;
        }

        Ok(())
    }

    async fn image_id(&self, reference: &ImageRef) -> Result<Option<ImageId>, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(details) => Ok(Some(ImageId::new(details.id.unwrap_or(image_name)))),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, e
            ))),
        }
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &config.ports {
            let port_key = format!("{}/tcp", port.container_port);
            exposed_ports.push(port_key.clone());
            port_bindings.insert(
                port_key,
                Some(vec![PortBinding {
                    host_ip: port.host_ip.clone(),
                    host_port: Some(port.host_port.to_string()),
                }]),
            );
        }

        let host_config = HostConfig {
            restart_policy: Some(restart_policy(&config.restart_policy)),
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            network_mode: config.network.clone(),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(config.image.to_string()),
            env: (!env.is_empty()).then_some(env),
            labels: (!config.labels.is_empty()).then(|| config.labels.clone()),
            cmd: config.command.clone(),
            host_config: Some(host_config),
            exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
            stop_timeout: config.stop_timeout.map(|d| d.as_secs() as i64),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
        signal: Option<&str>,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: signal.map(str::to_string),
        };

        match self.client.stop_container(id.as_str(), Some(opts)).await {
            Ok(()) => Ok(()),
            // Already stopped.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_container_error(e)),
        }
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| ContainerState::parse(&format!("{:?}", s)))
            .unwrap_or(ContainerState::Exited);

        let health = details
            .state
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .map(|s| match s {
                bollard::models::HealthStatusEnum::STARTING => HealthState::Starting,
                bollard::models::HealthStatusEnum::HEALTHY => HealthState::Healthy,
                bollard::models::HealthStatusEnum::UNHEALTHY => HealthState::Unhealthy,
                _ => HealthState::None,
            });

        let started_at = parse_timestamp(
            details
                .state
                .as_ref()
                .and_then(|s| s.started_at.as_deref()),
        );

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            health,
            restart_count: details.restart_count.unwrap_or(0).max(0) as u32,
            started_at,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman reports "stopping" as a container state during shutdown, which
        // bollard fails to deserialize. It is transient, so retry briefly.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| ContainerSummary {
                            id: ContainerId::new(c.id.unwrap_or_default()),
                            name: c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default(),
                            image: c.image.unwrap_or_default(),
                            state: c
                                .state
                                .map(|s| ContainerState::parse(&format!("{:?}", s)))
                                .unwrap_or(ContainerState::Exited),
                            labels: c.labels.unwrap_or_default(),
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(ContainerError::Runtime(err_str));
                }
            }
        }

        Err(ContainerError::Runtime(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let log_opts = LogsOptions {
            stdout: true,
            stderr: true,
            follow: false,
            tail: opts.tail_param(),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts)).map(|result| {
            result
                .map(|output| {
                    let (stream, data) = match output {
                        bollard::container::LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        bollard::container::LogOutput::StdOut { message }
                        | bollard::container::LogOutput::StdIn { message }
                        | bollard::container::LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };
                    LogLine {
                        content: String::from_utf8_lossy(&data).trim_end().to_string(),
                        stream,
                    }
                })
                .map_err(|e| LogError::StreamError(e.to_string()))
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_failure_policy_carries_retry_count() {
        let policy = restart_policy(&RestartPolicyConfig::OnFailure {
            max_retries: Some(3),
        });
        assert_eq!(policy.name, Some(RestartPolicyNameEnum::ON_FAILURE));
        assert_eq!(policy.maximum_retry_count, Some(3));
    }

    #[test]
    fn zero_timestamp_means_never_started() {
        assert!(parse_timestamp(Some("0001-01-01T00:00:00Z")).is_none());
        assert!(parse_timestamp(Some("2026-05-01T12:00:00.123456789Z")).is_some());
        assert!(parse_timestamp(None).is_none());
    }
}
