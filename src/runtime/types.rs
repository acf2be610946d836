// ABOUTME: Which container engine serves the slots and where its API socket lives.
// ABOUTME: RuntimeConfig is the `runtime:` override; RuntimeInfo is what detection settled on.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }

    /// System-wide API socket.
    pub fn default_socket(self) -> &'static str {
        match self {
            RuntimeType::Docker => "/var/run/docker.sock",
            RuntimeType::Podman => "/run/podman/podman.sock",
        }
    }

    /// Guess the engine behind a socket path.
    pub fn from_socket(path: &str) -> Self {
        if path.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

impl RuntimeInfo {
    pub fn docker_host(&self) -> String {
        format!("unix://{}", self.socket_path)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Skip detection and use this engine.
    pub runtime: Option<RuntimeType>,
    /// Socket path; defaults to the engine's system socket.
    pub socket: Option<String>,
}
