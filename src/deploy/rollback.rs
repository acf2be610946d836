// ABOUTME: Rollback to a previously successful release through the reduced pipeline.
// ABOUTME: A failed rollback is final: it is reported for manual intervention, never retried.

use super::DeployError;
use super::context::Profile;
use super::lock::DeploymentLock;
use super::platform::Platform;
use super::record::DeploymentRecord;
use super::runner::{Blocker, GateListener, GateRunner, Verdict, VerdictStatus};
use crate::types::TagName;

pub struct RollbackManager<'a> {
    platform: &'a Platform,
    listener: &'a dyn GateListener,
}

impl<'a> RollbackManager<'a> {
    pub fn new(platform: &'a Platform, listener: &'a dyn GateListener) -> Self {
        Self { platform, listener }
    }

    /// The record proving `tag` was deployed successfully in this environment.
    pub fn validate_target(&self, tag: &TagName) -> Result<DeploymentRecord, DeployError> {
        let recorder = self.platform.recorder();
        if let Some(record) = recorder.find_success(tag)? {
            return Ok(record);
        }
        match recorder.active()? {
            Some(active) if active.tag.as_str() == tag.as_str() => Ok(active),
            _ => Err(DeployError::InvalidRollbackTarget {
                tag: tag.to_string(),
            }),
        }
    }

    /// Redeploy `tag` with the rollback profile. Target validation and tag
    /// resolution errors are returned as `Err`; everything after that is in
    /// the verdict.
    pub async fn rollback(
        &self,
        tag: &TagName,
        lock: &DeploymentLock,
    ) -> Result<Verdict, DeployError> {
        let target = self.validate_target(tag)?;
        let release = self.platform.tags().resolve(tag).await?;

        if !release.commit.matches(&target.commit) {
            return Err(DeployError::InvalidRollbackTarget {
                tag: format!("{} (tag now points at {})", tag, release.commit.short()),
            });
        }

        let previous = self.platform.recorder().active()?.map(|r| r.tag);
        tracing::info!("rolling back {} to {}", self.platform.config.environment, tag);

        let mut verdict = GateRunner::new(self.platform, self.listener)
            .execute(&release, lock, Profile::Rollback, previous)
            .await?
            .verdict;

        if !verdict.passed() {
            let reason = verdict
                .blockers
                .first()
                .map(|b| b.message.clone())
                .unwrap_or_else(|| "unknown failure".to_string());
            tracing::error!(
                "rollback to {} failed, manual intervention required: {}",
                tag,
                reason
            );
            let fatal = DeployError::RollbackFailed {
                tag: tag.to_string(),
                reason,
            };
            verdict.blockers.push(Blocker::new(None, &fatal));
            verdict.status = VerdictStatus::RollbackFailed;
        }

        Ok(verdict)
    }
}
