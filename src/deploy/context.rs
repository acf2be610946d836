// ABOUTME: Mutable state threaded through the gates of one run.
// ABOUTME: Tracks the cutover stage, whether live service state changed, and non-fatal warnings.

use super::cutover::Cutover;
use super::state::{Drained, Healthy, Routed, Started, Verified};
use super::gate::GateResult;
use super::lock::DeploymentLock;
use super::platform::Platform;
use super::record::DeploymentRecord;
use super::service::{Instance, ServiceController};
use crate::diagnostics::{Diagnostics, Warning};
use crate::vcs::ReleaseTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Full pipeline for a new release.
    Forward,
    /// Reduced pipeline with tighter budgets against a known-good release.
    Rollback,
}

/// Where the candidate currently is in the cutover.
#[derive(Debug)]
pub enum Stage {
    Started(Cutover<Started>),
    Healthy(Cutover<Healthy>),
    Verified(Cutover<Verified>),
    Routed(Cutover<Routed>),
    Drained(Cutover<Drained>),
}

impl Stage {
    pub fn candidate(&self) -> &Instance {
        match self {
            Stage::Started(c) => c.candidate(),
            Stage::Healthy(c) => c.candidate(),
            Stage::Verified(c) => c.candidate(),
            Stage::Routed(c) => c.candidate(),
            Stage::Drained(c) => c.candidate(),
        }
    }

    /// Stop a candidate that never received traffic. Once routed there is
    /// nothing to abort; recovery is a rollback.
    pub async fn abort(self, controller: &ServiceController<'_>, diagnostics: &mut Diagnostics) {
        let result = match self {
            Stage::Started(c) => c.abort(controller).await,
            Stage::Healthy(c) => c.abort(controller).await,
            Stage::Verified(c) => c.abort(controller).await,
            Stage::Routed(_) | Stage::Drained(_) => return,
        };
        if let Err(e) = result {
            diagnostics.warn(Warning::cleanup(format!("failed to stop candidate: {}", e)));
        }
    }
}

pub struct RunContext<'a> {
    pub platform: &'a Platform,
    /// Proof that the deployment lock is held for the whole run.
    pub lock: &'a DeploymentLock,
    pub release: &'a ReleaseTag,
    pub profile: Profile,
    /// Instance serving traffic when the run started.
    pub live: Option<Instance>,
    pub stage: Option<Stage>,
    /// Set once anything that was running has been changed.
    pub service_mutated: bool,
    pub restarts: u32,
    pub record: DeploymentRecord,
    pub results: Vec<GateResult>,
    pub diagnostics: Diagnostics,
}

impl<'a> RunContext<'a> {
    pub fn new(
        platform: &'a Platform,
        lock: &'a DeploymentLock,
        release: &'a ReleaseTag,
        profile: Profile,
        record: DeploymentRecord,
    ) -> Self {
        Self {
            platform,
            lock,
            release,
            profile,
            live: None,
            stage: None,
            service_mutated: false,
            restarts: 0,
            record,
            results: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn controller(&self) -> ServiceController<'a> {
        self.platform.controller()
    }
}
