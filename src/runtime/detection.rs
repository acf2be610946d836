// ABOUTME: Container runtime detection on the deploy host.
// ABOUTME: Honours explicit config and DOCKER_HOST, then checks Podman and Docker sockets.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,
}

/// Detect the container runtime.
///
/// Order:
/// 1. explicit `runtime:` config
/// 2. `DOCKER_HOST=unix://...`
/// 3. rootless Podman (`/run/user/$UID/podman/podman.sock`)
/// 4. rootful Podman (`/run/podman/podman.sock`)
/// 5. Docker (`/var/run/docker.sock`)
pub fn detect_local(config: &RuntimeConfig) -> Result<RuntimeInfo, DetectionError> {
    if let Some(runtime_type) = config.runtime {
        let socket_path = config
            .socket
            .clone()
            .unwrap_or_else(|| runtime_type.default_socket().to_string());
        return Ok(RuntimeInfo {
            runtime_type,
            socket_path,
        });
    }

    if let Some(socket) = std::env::var("DOCKER_HOST")
        .ok()
        .and_then(|host| host.strip_prefix("unix://").map(str::to_string))
    {
        return Ok(RuntimeInfo {
            runtime_type: RuntimeType::from_socket(&socket),
            socket_path: socket,
        });
    }

    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(RuntimeInfo {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    for runtime_type in [RuntimeType::Podman, RuntimeType::Docker] {
        let socket = runtime_type.default_socket();
        if Path::new(socket).exists() {
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path: socket.to_string(),
            });
        }
    }

    Err(DetectionError::NoRuntimeFound)
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_wins() {
        let config = RuntimeConfig {
            runtime: Some(RuntimeType::Podman),
            socket: None,
        };
        let info = detect_local(&config).unwrap();
        assert_eq!(info.runtime_type, RuntimeType::Podman);
        assert_eq!(info.socket_path, "/run/podman/podman.sock");
        assert_eq!(info.docker_host(), "unix:///run/podman/podman.sock");
    }

    #[test]
    fn docker_host_socket_is_used() {
        temp_env::with_var("DOCKER_HOST", Some("unix:///tmp/podman/podman.sock"), || {
            let info = detect_local(&RuntimeConfig::default()).unwrap();
            assert_eq!(info.runtime_type, RuntimeType::Podman);
            assert_eq!(info.socket_path, "/tmp/podman/podman.sock");
        });
    }
}
