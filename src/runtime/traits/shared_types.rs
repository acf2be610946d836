// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, ContainerInfo, container state and health.

use chrono::{DateTime, Utc};
use crate::types::{ContainerId, ImageRef};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub name: String,
    pub image: ImageRef,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub ports: Vec<PortMapping>,
    /// Overrides the image CMD.
    pub command: Option<Vec<String>>,
    pub restart_policy: RestartPolicyConfig,
    pub stop_timeout: Option<Duration>,
    pub network: Option<String>,
}

/// Publish `container_port` on `host_ip:host_port` (tcp).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub host_ip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestartPolicyConfig {
    No,
    #[default]
    UnlessStopped,
    OnFailure { max_retries: Option<u32> },
}

/// Information about a container, as inspected.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// Health status if the image defines a healthcheck.
    pub health: Option<HealthState>,
    pub restart_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerState {
    /// Parse a runtime state string. Unknown states (e.g. podman's "stopping")
    /// are treated as exited.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Exited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_states_read_as_exited() {
        assert_eq!(ContainerState::parse("RUNNING"), ContainerState::Running);
        assert_eq!(ContainerState::parse("stopping"), ContainerState::Exited);
    }
}
