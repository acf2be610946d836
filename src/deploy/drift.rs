// ABOUTME: Out-of-band comparison of what is running against what was deployed.
// ABOUTME: Defers while a deployment holds the lock; observes only, never changes anything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::DeployError;
use super::context::Profile;
use super::lock::{DeploymentLock, LockInfo};
use super::platform::Platform;
use super::record::{append_line, write_atomic};
use super::service::ServiceHealth;
use crate::config::HealthcheckConfig;
use crate::health::{HealthProbe, Observation};
use crate::types::{CommitHash, TagName};

pub const DRIFT_REPORT_FILENAME: &str = "drift.json";
pub const DRIFT_LOG_FILENAME: &str = "drift.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftFinding {
    UncommittedChanges { paths: Vec<PathBuf> },
    CommitMismatch {
        expected: CommitHash,
        actual: Option<CommitHash>,
    },
    NoActiveDeployment,
    ServiceUnhealthy { service: String, reason: String },
    DependencyUnreachable { service: String, dependency: String },
}

impl DriftFinding {
    /// Findings that mean running state diverged from the source of truth.
    pub fn is_drift(&self) -> bool {
        matches!(
            self,
            DriftFinding::UncommittedChanges { .. } | DriftFinding::CommitMismatch { .. }
        )
    }
}

impl fmt::Display for DriftFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftFinding::UncommittedChanges { paths } => {
                let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "uncommitted changes: {}", paths.join(", "))
            }
            DriftFinding::CommitMismatch {
                expected,
                actual: Some(actual),
            } => write!(
                f,
                "running commit {} does not match deployed {}",
                actual.short(),
                expected.short()
            ),
            DriftFinding::CommitMismatch {
                expected,
                actual: None,
            } => write!(f, "nothing running, expected {}", expected.short()),
            DriftFinding::NoActiveDeployment => write!(f, "no active deployment record"),
            DriftFinding::ServiceUnhealthy { service, reason } => {
                write!(f, "{service} unhealthy: {reason}")
            }
            DriftFinding::DependencyUnreachable {
                service,
                dependency,
            } => write!(f, "{service}: dependency {dependency} unreachable"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub environment: String,
    pub expected_tag: Option<TagName>,
    pub expected_commit: Option<CommitHash>,
    pub actual_commit: Option<CommitHash>,
    pub uncommitted_paths: Vec<PathBuf>,
    pub findings: Vec<DriftFinding>,
    pub generated_at: DateTime<Utc>,
}

impl DriftReport {
    /// Running commit differs from the deployed one, or the workspace has
    /// uncommitted tracked changes.
    pub fn has_drift(&self) -> bool {
        self.findings.iter().any(DriftFinding::is_drift)
    }

    /// No findings of any kind.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn mismatch(&self) -> bool {
        self.findings
            .iter()
            .any(|f| matches!(f, DriftFinding::CommitMismatch { .. }))
    }
}

#[derive(Debug)]
pub enum DriftOutcome {
    /// A deployment or rollback holds the lock; nothing was inspected.
    Deferred(LockInfo),
    Report(DriftReport),
}

pub struct DriftDetector<'a> {
    platform: &'a Platform,
}

impl<'a> DriftDetector<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    /// Inspect under the deployment lock, or defer if it is held.
    pub async fn check(&self) -> Result<DriftOutcome, DeployError> {
        let lock = match DeploymentLock::try_acquire(&self.platform.state_dir(), "drift-check")? {
            Ok(lock) => lock,
            Err(holder) => {
                tracing::info!(
                    "deferring drift check: {} holds the lock ({})",
                    holder.holder,
                    holder.operation
                );
                return Ok(DriftOutcome::Deferred(holder));
            }
        };

        let report = self.inspect().await;
        if let Err(e) = lock.release() {
            tracing::warn!("{}", e);
        }
        Ok(DriftOutcome::Report(report?))
    }

    async fn inspect(&self) -> Result<DriftReport, DeployError> {
        let platform = self.platform;
        let controller = platform.controller();
        let mut findings = Vec::new();

        let uncommitted = platform.vcs.uncommitted_paths().await?;
        if !uncommitted.is_empty() {
            findings.push(DriftFinding::UncommittedChanges {
                paths: uncommitted.clone(),
            });
        }

        let active = platform.recorder().active()?;
        let live = controller.live_instance().await?.instance;
        let actual_commit = live.as_ref().and_then(|i| i.commit.clone());

        match &active {
            None => findings.push(DriftFinding::NoActiveDeployment),
            Some(record) => {
                let matches = actual_commit
                    .as_ref()
                    .is_some_and(|actual| actual.matches(&record.commit));
                if !matches {
                    findings.push(DriftFinding::CommitMismatch {
                        expected: record.commit.clone(),
                        actual: actual_commit.clone(),
                    });
                }
            }
        }

        let service = platform.config.service.to_string();
        if let Some(instance) = &live {
            let probe = HealthProbe::new(HealthcheckConfig {
                require_ready: false,
                ..platform.healthcheck(Profile::Forward)
            });
            match probe.observe(&controller.address(instance.slot)).await {
                Observation::Ready(payload) => {
                    for dependency in payload.failing_checks() {
                        findings.push(DriftFinding::DependencyUnreachable {
                            service: service.clone(),
                            dependency,
                        });
                    }
                    if payload.ready == Some(false) && payload.failing_checks().is_empty() {
                        findings.push(DriftFinding::ServiceUnhealthy {
                            service: service.clone(),
                            reason: "reports not ready".to_string(),
                        });
                    }
                }
                Observation::NotReady(reason) | Observation::Unreachable(reason) => {
                    findings.push(DriftFinding::ServiceUnhealthy {
                        service: service.clone(),
                        reason,
                    });
                }
            }
        }

        for state in controller.service_states().await? {
            if state.service != service && state.health == ServiceHealth::Unhealthy {
                findings.push(DriftFinding::ServiceUnhealthy {
                    service: state.service,
                    reason: format!("runtime reports unhealthy ({} restarts)", state.restart_count),
                });
            }
        }

        Ok(DriftReport {
            environment: platform.config.environment.clone(),
            expected_tag: active.as_ref().map(|r| r.tag.clone()),
            expected_commit: active.map(|r| r.commit),
            actual_commit,
            uncommitted_paths: uncommitted,
            findings,
            generated_at: Utc::now(),
        })
    }

    /// Keep the latest report and append it to the audit log.
    pub fn persist(&self, report: &DriftReport) -> Result<(), DeployError> {
        let dir = self.platform.state_dir();
        std::fs::create_dir_all(&dir).map_err(DeployError::record)?;

        let pretty = serde_json::to_string_pretty(report).map_err(DeployError::record)?;
        write_atomic(&dir.join(DRIFT_REPORT_FILENAME), pretty.as_bytes())?;

        let line = serde_json::to_string(report).map_err(DeployError::record)?;
        append_line(&dir.join(DRIFT_LOG_FILENAME), &line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(findings: Vec<DriftFinding>) -> DriftReport {
        DriftReport {
            environment: "production".to_string(),
            expected_tag: None,
            expected_commit: None,
            actual_commit: None,
            uncommitted_paths: Vec::new(),
            findings,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn health_findings_are_not_drift() {
        let report = report(vec![DriftFinding::DependencyUnreachable {
            service: "app".to_string(),
            dependency: "database".to_string(),
        }]);
        assert!(!report.has_drift());
        assert!(!report.is_clean());
    }

    #[test]
    fn uncommitted_changes_are_drift() {
        let finding = DriftFinding::UncommittedChanges {
            paths: vec![PathBuf::from("app/settings.py")],
        };
        assert_eq!(finding.to_string(), "uncommitted changes: app/settings.py");
        let report = report(vec![finding]);
        assert!(report.has_drift());
        assert!(!report.mismatch());
    }

    #[test]
    fn findings_serialize_with_kind_tag() {
        let json = serde_json::to_value(DriftFinding::NoActiveDeployment).unwrap();
        assert_eq!(json["kind"], "no_active_deployment");
    }
}
