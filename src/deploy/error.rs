// ABOUTME: Error taxonomy for the release pipeline.
// ABOUTME: Every variant maps to a DeployErrorKind used in blockers, records and exit codes.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::{ContainerError, ImageError};
use crate::vcs::VcsError;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Pre-flight check failed; nothing was changed.
    #[error("{check}: {reason}")]
    Validation { check: String, reason: String },

    #[error("build failed: {0}")]
    Build(String),

    #[error("static check failed for {}", display_paths(.paths))]
    StaticCheck { paths: Vec<PathBuf> },

    #[error("{service}: {reason}")]
    ServiceControl { service: String, reason: String },

    #[error("candidate not healthy after {elapsed:?} (health timeout): {reason}")]
    HealthTimeout { elapsed: Duration, reason: String },

    #[error("candidate unhealthy after {attempts} counted attempts: {reason}")]
    Unhealthy { attempts: u32, reason: String },

    #[error("smoke test {check} failed: {reason}")]
    SmokeTest { check: String, reason: String },

    #[error("traffic cutover failed: {0}")]
    Cutover(String),

    #[error("drift detected: {0}")]
    DriftDetected(String),

    /// The rollback itself failed. Never retried automatically.
    #[error("rollback to {tag} failed: {reason}")]
    RollbackFailed { tag: String, reason: String },

    #[error("no previous successful deployment to roll back to")]
    NoRollbackTarget,

    #[error("{tag} has no successful deployment record")]
    InvalidRollbackTarget { tag: String },

    #[error("deployment lock held by {holder} (pid {pid}, {operation}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        operation: String,
        started_at: DateTime<Utc>,
    },

    #[error("deployment lock error: {0}")]
    Lock(String),

    #[error("failed to persist deployment state: {0}")]
    Record(String),

    #[error(transparent)]
    Tag(#[from] VcsError),

    #[error("configuration error: {0}")]
    Config(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Validation,
    Build,
    ServiceControl,
    HealthTimeout,
    SmokeTest,
    Cutover,
    DriftDetected,
    RollbackFailure,
    RollbackTarget,
    Lock,
    Record,
    Config,
}

impl DeployErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            DeployErrorKind::Validation => "ValidationError",
            DeployErrorKind::Build => "BuildError",
            DeployErrorKind::ServiceControl => "ServiceControlError",
            DeployErrorKind::HealthTimeout => "HealthTimeoutError",
            DeployErrorKind::SmokeTest => "SmokeTestFailure",
            DeployErrorKind::Cutover => "CutoverError",
            DeployErrorKind::DriftDetected => "DriftDetected",
            DeployErrorKind::RollbackFailure => "RollbackFailure",
            DeployErrorKind::RollbackTarget => "RollbackTargetError",
            DeployErrorKind::Lock => "LockError",
            DeployErrorKind::Record => "RecordError",
            DeployErrorKind::Config => "ConfigError",
        }
    }
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Validation { .. } => DeployErrorKind::Validation,
            DeployError::Build(_) | DeployError::StaticCheck { .. } => DeployErrorKind::Build,
            DeployError::ServiceControl { .. } => DeployErrorKind::ServiceControl,
            DeployError::HealthTimeout { .. } | DeployError::Unhealthy { .. } => {
                DeployErrorKind::HealthTimeout
            }
            DeployError::SmokeTest { .. } => DeployErrorKind::SmokeTest,
            DeployError::Cutover(_) => DeployErrorKind::Cutover,
            DeployError::DriftDetected(_) => DeployErrorKind::DriftDetected,
            DeployError::RollbackFailed { .. } => DeployErrorKind::RollbackFailure,
            DeployError::NoRollbackTarget | DeployError::InvalidRollbackTarget { .. } => {
                DeployErrorKind::RollbackTarget
            }
            DeployError::LockHeld { .. } | DeployError::Lock(_) => DeployErrorKind::Lock,
            DeployError::Record(_) => DeployErrorKind::Record,
            DeployError::Tag(_) | DeployError::Config(_) => DeployErrorKind::Config,
        }
    }

    pub fn validation(check: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::Validation {
            check: check.into(),
            reason: reason.into(),
        }
    }

    pub fn service(service: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        DeployError::ServiceControl {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn record(reason: impl std::fmt::Display) -> Self {
        DeployError::Record(reason.to_string())
    }
}

impl From<ImageError> for DeployError {
    fn from(err: ImageError) -> Self {
        DeployError::Build(err.to_string())
    }
}

impl From<ContainerError> for DeployError {
    fn from(err: ContainerError) -> Self {
        DeployError::service("container runtime", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_failures_share_a_kind() {
        let timeout = DeployError::HealthTimeout {
            elapsed: Duration::from_secs(60),
            reason: "connection refused".to_string(),
        };
        let unhealthy = DeployError::Unhealthy {
            attempts: 5,
            reason: "HTTP 503".to_string(),
        };
        assert_eq!(timeout.kind(), DeployErrorKind::HealthTimeout);
        assert_eq!(unhealthy.kind(), DeployErrorKind::HealthTimeout);
        assert!(timeout.to_string().contains("health timeout"));
    }

    #[test]
    fn static_check_lists_offending_paths() {
        let err = DeployError::StaticCheck {
            paths: vec![PathBuf::from("app/a.py"), PathBuf::from("app/b.py")],
        };
        assert_eq!(err.to_string(), "static check failed for app/a.py, app/b.py");
        assert_eq!(err.kind().name(), "BuildError");
    }
}
