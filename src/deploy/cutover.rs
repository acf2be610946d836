// ABOUTME: Blue/green traffic cutover as a type state machine.
// ABOUTME: Traffic can only be routed to a candidate that is both healthy and smoke-verified.

use std::marker::PhantomData;
use std::time::Duration;

use super::DeployError;
use super::lock::DeploymentLock;
use super::service::{Instance, ServiceController};
use super::smoke::SmokeReport;
use super::state::{Drained, Healthy, Routed, Started, Verified};
use crate::health::HealthVerdict;
use crate::proxy::{ProxyAdmin, RouteChange};
use crate::vcs::ReleaseTag;

/// Result of a transition that hands the unchanged state back on failure,
/// so the caller can still abort it.
pub type Transition<T, S> = Result<Cutover<T>, (Cutover<S>, DeployError)>;

#[derive(Debug)]
pub struct Cutover<S> {
    candidate: Instance,
    previous: Option<Instance>,
    /// The candidate was already live; nothing was started and nothing is drained.
    reused: bool,
    _state: PhantomData<S>,
}

impl<S> Cutover<S> {
    fn transition<T>(self) -> Cutover<T> {
        Cutover {
            candidate: self.candidate,
            previous: self.previous,
            reused: self.reused,
            _state: PhantomData,
        }
    }

    pub fn candidate(&self) -> &Instance {
        &self.candidate
    }

    pub fn previous(&self) -> Option<&Instance> {
        self.previous.as_ref()
    }

    pub fn is_reused(&self) -> bool {
        self.reused
    }
}

impl Cutover<Started> {
    /// A freshly started candidate next to the (optional) live instance.
    pub fn launched(candidate: Instance, previous: Option<Instance>) -> Self {
        Cutover {
            candidate,
            previous,
            reused: false,
            _state: PhantomData,
        }
    }

    /// The live instance already runs the release; it is re-verified in place.
    pub fn reuse(live: Instance) -> Self {
        Cutover {
            candidate: live,
            previous: None,
            reused: true,
            _state: PhantomData,
        }
    }

    pub fn confirm_health(self, verdict: &HealthVerdict) -> Transition<Healthy, Started> {
        match verdict {
            HealthVerdict::Healthy { .. } => Ok(self.transition()),
            HealthVerdict::Unhealthy { reason, attempts } => {
                let err = DeployError::Unhealthy {
                    attempts: *attempts,
                    reason: reason.clone(),
                };
                Err((self, err))
            }
            HealthVerdict::Timeout {
                reason, elapsed, ..
            } => {
                let err = DeployError::HealthTimeout {
                    elapsed: *elapsed,
                    reason: reason.clone(),
                };
                Err((self, err))
            }
        }
    }
}

impl Cutover<Healthy> {
    pub fn confirm_smoke(self, report: &SmokeReport) -> Transition<Verified, Healthy> {
        match report.failures().next() {
            None => Ok(self.transition()),
            Some(failed) => {
                let err = DeployError::SmokeTest {
                    check: failed.name.clone(),
                    reason: failed.detail.clone(),
                };
                Err((self, err))
            }
        }
    }
}

impl Cutover<Verified> {
    /// Point the proxy at the candidate. Switching to an upstream that is
    /// already routed is a no-op.
    pub async fn route(
        self,
        proxy: &dyn ProxyAdmin,
        dial: &str,
    ) -> Transition<Routed, Verified> {
        match proxy.route_to(dial).await {
            Ok(RouteChange::Unchanged) => {
                tracing::debug!("proxy already routes to {}", dial);
                Ok(self.transition())
            }
            Ok(RouteChange::Switched { previous }) => {
                let from: Vec<&str> = previous.iter().map(|u| u.dial.as_str()).collect();
                tracing::info!("traffic switched from [{}] to {}", from.join(", "), dial);
                Ok(self.transition())
            }
            Err(e) => Err((self, DeployError::Cutover(e.to_string()))),
        }
    }
}

impl Cutover<Routed> {
    /// Stop the previous instance after `grace`. Failures here do not undo
    /// the cutover; they come back as warnings.
    pub async fn drain(
        self,
        controller: &ServiceController<'_>,
        grace: Duration,
    ) -> (Cutover<Drained>, Vec<String>) {
        let mut warnings = Vec::new();

        if let Some(previous) = self.previous.as_ref().filter(|p| p.running) {
            tracing::info!(
                "draining {} slot for {:?} before stopping",
                previous.slot,
                grace
            );
            tokio::time::sleep(grace).await;
            if let Err(e) = controller.stop(previous, grace).await {
                warnings.push(format!("previous {} instance: {}", previous.slot, e));
            }
        }

        (self.transition(), warnings)
    }
}

impl Cutover<Drained> {
    /// Recreate the drained slot on the new release, left stopped.
    pub async fn rebuild_idle(
        &self,
        controller: &ServiceController<'_>,
        lock: &DeploymentLock,
        release: &ReleaseTag,
    ) -> Result<(), DeployError> {
        if self.reused {
            return Ok(());
        }
        controller
            .rebuild_idle(lock, release, self.candidate.slot.other())
            .await
    }
}

mod sealed {
    pub trait PreRoute {}
    impl PreRoute for super::Started {}
    impl PreRoute for super::Healthy {}
    impl PreRoute for super::Verified {}
}

impl<S: sealed::PreRoute> Cutover<S> {
    /// Stop and remove a candidate that never received traffic. A reused
    /// live instance is left running.
    pub async fn abort(self, controller: &ServiceController<'_>) -> Result<(), DeployError> {
        if self.reused {
            return Ok(());
        }
        tracing::info!("stopping unrouted candidate in {} slot", self.candidate.slot);
        let grace = Duration::from_secs(10);
        if let Err(e) = controller.stop(&self.candidate, grace).await {
            tracing::warn!("stopping candidate before removal failed: {}", e);
        }
        controller.remove(&self.candidate).await
    }
}
