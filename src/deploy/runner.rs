// ABOUTME: Runs the ordered gates, stops at the first failure and reports a verdict.
// ABOUTME: Failures after live service state changed trigger an automatic rollback.

use serde::Serialize;

use super::DeployError;
use super::context::{Profile, RunContext};
use super::gate::{Gate, GateId, GateResult, Outcome};
use super::gates::{forward_gates, rollback_gates};
use super::lock::DeploymentLock;
use super::platform::Platform;
use super::record::{DeploymentRecord, DeploymentStatus};
use super::rollback::RollbackManager;
use crate::diagnostics::Warning;
use crate::types::{CommitHash, TagName};
use crate::vcs::ReleaseTag;

/// Observer for progress output while a run is in flight.
pub trait GateListener: Send + Sync {
    fn gate_finished(&self, result: &GateResult);

    fn rollback_started(&self, _target: &TagName) {}
}

impl GateListener for () {
    fn gate_finished(&self, _result: &GateResult) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Run,
    Rollback,
}

impl From<Profile> for Operation {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Forward => Operation::Run,
            Profile::Rollback => Operation::Rollback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Success,
    Failed,
    /// The rollback itself failed; manual intervention required.
    RollbackFailed,
}

impl VerdictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Success => "success",
            VerdictStatus::Failed => "failed",
            VerdictStatus::RollbackFailed => "rollback_failed",
        }
    }
}

/// A named reason the run did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateId>,
    pub kind: &'static str,
    pub message: String,
}

impl Blocker {
    pub fn new(gate: Option<GateId>, error: &DeployError) -> Self {
        Self {
            gate,
            kind: error.kind().name(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub operation: Operation,
    pub environment: String,
    pub tag: TagName,
    pub commit: CommitHash,
    pub gates: Vec<GateResult>,
    pub status: VerdictStatus,
    pub blockers: Vec<Blocker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Box<Verdict>>,
    pub warnings: Vec<Warning>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Success
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            VerdictStatus::Success => 0,
            VerdictStatus::Failed => 1,
            VerdictStatus::RollbackFailed => 2,
        }
    }

    /// (passed, warned, failed) gate counts.
    pub fn tally(&self) -> (usize, usize, usize) {
        let count = |outcome| self.gates.iter().filter(|g| g.outcome == outcome).count();
        (count(Outcome::Pass), count(Outcome::Warn), count(Outcome::Fail))
    }

    /// Every warning of this run and of its rollback.
    pub fn all_warnings(&self) -> Vec<&Warning> {
        let mut warnings: Vec<&Warning> = self.warnings.iter().collect();
        if let Some(rollback) = &self.rollback {
            warnings.extend(rollback.all_warnings());
        }
        warnings
    }
}

/// A finished pipeline plus whether it changed anything that was running.
pub(crate) struct Execution {
    pub verdict: Verdict,
    pub service_mutated: bool,
}

pub struct GateRunner<'a> {
    platform: &'a Platform,
    listener: &'a dyn GateListener,
}

impl<'a> GateRunner<'a> {
    pub fn new(platform: &'a Platform, listener: &'a dyn GateListener) -> Self {
        Self { platform, listener }
    }

    /// Deploy `tag`. The caller holds the deployment lock for the whole run.
    pub async fn run(&self, tag: &TagName, lock: &DeploymentLock) -> Result<Verdict, DeployError> {
        let release = self.platform.tags().resolve(tag).await?;
        let active = self.platform.recorder().active()?;
        let previous_tag = active.as_ref().map(|r| r.tag.clone());

        tracing::info!(
            "deploying {} ({}) to {}",
            release.name,
            release.commit.short(),
            self.platform.config.environment
        );

        let Execution {
            mut verdict,
            service_mutated,
        } = self
            .execute(&release, lock, Profile::Forward, previous_tag.clone())
            .await?;

        if verdict.passed() || !service_mutated {
            return Ok(verdict);
        }

        let Some(target) = previous_tag else {
            tracing::warn!("no previous successful deployment, leaving service as is");
            verdict
                .blockers
                .push(Blocker::new(None, &DeployError::NoRollbackTarget));
            return Ok(verdict);
        };

        tracing::warn!("{} failed after changing the service, rolling back to {}", tag, target);
        self.listener.rollback_started(&target);
        let rollback = RollbackManager::new(self.platform, self.listener)
            .rollback(&target, lock)
            .await;

        match rollback {
            Ok(outcome) => {
                if !outcome.passed() {
                    verdict.status = VerdictStatus::RollbackFailed;
                    verdict.blockers.extend(outcome.blockers.iter().cloned());
                }
                verdict.rollback = Some(Box::new(outcome));
            }
            Err(e) => {
                tracing::error!("automatic rollback to {} failed: {}", target, e);
                let failed = DeployError::RollbackFailed {
                    tag: target.to_string(),
                    reason: e.to_string(),
                };
                verdict.status = VerdictStatus::RollbackFailed;
                verdict.blockers.push(Blocker::new(None, &failed));
            }
        }

        Ok(verdict)
    }

    /// Run one pipeline without any rollback handling.
    pub(crate) async fn execute(
        &self,
        release: &ReleaseTag,
        lock: &DeploymentLock,
        profile: Profile,
        previous_tag: Option<TagName>,
    ) -> Result<Execution, DeployError> {
        let platform = self.platform;
        let recorder = platform.recorder();
        let image = platform.image_for(&release.name);

        let pending = DeploymentRecord::pending(
            platform.config.environment.clone(),
            release.name.clone(),
            release.commit.clone(),
            image.to_string(),
            previous_tag,
        );
        recorder.record(&pending)?;

        let mut ctx = RunContext::new(platform, lock, release, profile, pending);
        let gates = match profile {
            Profile::Forward => forward_gates(),
            Profile::Rollback => rollback_gates(),
        };

        let failure = self.run_gates(&gates, &mut ctx).await;

        let mut blockers = Vec::new();
        if let Some((gate, error)) = &failure {
            blockers.push(Blocker::new(Some(*gate), error));

            if let Some(stage) = ctx.stage.take() {
                stage.abort(&ctx.controller(), &mut ctx.diagnostics).await;
            }

            let mut failed = ctx.record.finalize(DeploymentStatus::Failed, &ctx.results);
            failed.blockers = blockers.iter().map(|b| b.message.clone()).collect();
            if let Err(e) = recorder.record(&failed) {
                tracing::error!("could not persist failed record: {}", e);
                blockers.push(Blocker::new(None, &e));
            }
        }

        let verdict = Verdict {
            operation: profile.into(),
            environment: platform.config.environment.clone(),
            tag: release.name.clone(),
            commit: release.commit.clone(),
            gates: ctx.results,
            status: if failure.is_some() {
                VerdictStatus::Failed
            } else {
                VerdictStatus::Success
            },
            blockers,
            rollback: None,
            warnings: ctx.diagnostics.into_warnings(),
        };

        tracing::info!(
            "{} {} finished: {:?} ({} restarts)",
            release.name,
            match profile {
                Profile::Forward => "run",
                Profile::Rollback => "rollback",
            },
            verdict.status,
            ctx.restarts
        );

        Ok(Execution {
            verdict,
            service_mutated: ctx.service_mutated,
        })
    }

    /// Run gates in order until one fails.
    async fn run_gates(
        &self,
        gates: &[Box<dyn Gate>],
        ctx: &mut RunContext<'_>,
    ) -> Option<(GateId, DeployError)> {
        for (index, gate) in gates.iter().enumerate() {
            let id = gate.id();
            let ordinal = index + 1;
            tracing::debug!("gate {} {} starting", ordinal, id);

            let (result, error) = match gate.run(ctx).await {
                Ok(outcome) => (GateResult::from_outcome(id, ordinal, outcome), None),
                Err(e) => (GateResult::failed(id, ordinal, &e), Some(e)),
            };

            tracing::info!("gate {} {}: {}", id, result.outcome, result.detail);
            self.listener.gate_finished(&result);
            ctx.results.push(result);

            if let Some(error) = error {
                return Some((id, error));
            }
        }
        None
    }
}
