// ABOUTME: The concrete gates of the forward and rollback pipelines.
// ABOUTME: Gates only move the cutover forward; aborting and rolling back belong to the runner.

use async_trait::async_trait;
use std::time::Duration;

use super::DeployError;
use super::build::BuildVerifier;
use super::context::{Profile, RunContext, Stage};
use super::cutover::Cutover;
use super::gate::{Gate, GateId, GateOutcome};
use super::record::DeploymentStatus;
use super::smoke::{SmokeCheckResult, run_checks};
use super::validate::EnvironmentValidator;
use crate::config::SmokeCheck;
use crate::diagnostics::Warning;
use crate::health::{HealthVerdict, check_routes, scan_container};
use crate::http::HttpClient;

/// Gates of a forward deployment, in order.
pub fn forward_gates() -> Vec<Box<dyn Gate>> {
    vec![
        Box::new(EnvironmentGate),
        Box::new(BuildGate),
        Box::new(ServicesGate),
        Box::new(HealthGate),
        Box::new(SmokeGate),
        Box::new(CutoverGate),
        Box::new(RecordGate),
    ]
}

/// Reduced pipeline for a known-good release: no workspace validation and
/// no rebuild from source.
pub fn rollback_gates() -> Vec<Box<dyn Gate>> {
    vec![
        Box::new(ArtifactGate),
        Box::new(ServicesGate),
        Box::new(HealthGate),
        Box::new(SmokeGate),
        Box::new(CutoverGate),
        Box::new(RecordGate),
    ]
}

fn missing_stage(expected: &str) -> DeployError {
    DeployError::Cutover(format!("no candidate in {expected} state"))
}

pub struct EnvironmentGate;

#[async_trait]
impl Gate for EnvironmentGate {
    fn id(&self) -> GateId {
        GateId::Environment
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let platform = ctx.platform;
        let validator = EnvironmentValidator::new(
            platform.vcs.as_ref(),
            &platform.config.validation,
            &platform.workspace,
        );
        let checks = validator.validate(ctx.release).await?;
        let names: Vec<&str> = checks.iter().map(|c| c.name.as_str()).collect();
        Ok(GateOutcome::Pass(names.join(", ")))
    }
}

pub struct BuildGate;

#[async_trait]
impl Gate for BuildGate {
    fn id(&self) -> GateId {
        GateId::Build
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let platform = ctx.platform;
        let verifier = BuildVerifier::new(
            &platform.config.build,
            &platform.config.smoke,
            &platform.workspace,
        );

        let checked = verifier.static_check().await?;
        let commands = verifier.run_smoke_commands().await?;

        let image = platform.image_for(&ctx.release.name);
        let artifact = verifier
            .ensure_artifact(platform.runtime.as_ref(), &image, ctx.release, true)
            .await?;

        Ok(GateOutcome::Pass(format!(
            "{} files checked, {} smoke commands, {}",
            checked,
            commands,
            artifact.describe(&image)
        )))
    }
}

pub struct ArtifactGate;

#[async_trait]
impl Gate for ArtifactGate {
    fn id(&self) -> GateId {
        GateId::Artifact
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let platform = ctx.platform;
        let verifier = BuildVerifier::new(
            &platform.config.build,
            &platform.config.smoke,
            &platform.workspace,
        );
        let image = platform.image_for(&ctx.release.name);
        let artifact = verifier
            .ensure_artifact(platform.runtime.as_ref(), &image, ctx.release, false)
            .await?;
        Ok(GateOutcome::Pass(artifact.describe(&image)))
    }
}

/// Restarts auxiliary services and starts the candidate next to the live
/// instance. A live instance already on the release is reused untouched.
pub struct ServicesGate;

#[async_trait]
impl Gate for ServicesGate {
    fn id(&self) -> GateId {
        GateId::Services
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let controller = ctx.controller();
        let mut notes = Vec::new();
        let mut warn = false;

        let was_mutated = ctx.service_mutated;
        if !ctx.platform.config.services.is_empty() {
            // A failed required restart may already have stopped the old container.
            ctx.service_mutated = true;
        }
        let aux = controller.restart_aux(ctx.lock, ctx.release).await?;
        if aux.restarted.is_empty() && aux.degraded.is_empty() {
            ctx.service_mutated = was_mutated;
        }
        ctx.restarts += aux.restarted.len() as u32;
        if !aux.restarted.is_empty() {
            notes.push(format!("restarted {}", aux.restarted.join(", ")));
        }
        for (name, reason) in &aux.degraded {
            warn = true;
            ctx.diagnostics
                .warn(Warning::optional_service(format!("{name}: {reason}")));
            notes.push(format!("{name} degraded"));
        }

        let live = controller.live_instance().await?;
        if let Some(reason) = live.fallback {
            ctx.diagnostics.warn(Warning::discovery(reason));
        }
        ctx.live = live.instance.clone();

        let started = match live.instance {
            Some(instance) if instance.runs(&ctx.release.commit) => {
                notes.push(format!(
                    "{} slot already runs {}",
                    instance.slot,
                    ctx.release.commit.short()
                ));
                Cutover::reuse(instance)
            }
            previous => {
                let candidate = controller
                    .start_alternate(ctx.lock, ctx.release, previous.as_ref())
                    .await?;
                ctx.service_mutated = true;
                ctx.restarts += 1;
                notes.push(format!("candidate started in {} slot", candidate.slot));
                Cutover::launched(candidate, previous)
            }
        };
        ctx.stage = Some(Stage::Started(started));

        let detail = notes.join("; ");
        Ok(if warn {
            GateOutcome::Warn(detail)
        } else {
            GateOutcome::Pass(detail)
        })
    }
}

pub struct HealthGate;

#[async_trait]
impl Gate for HealthGate {
    fn id(&self) -> GateId {
        GateId::Health
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let started = match ctx.stage.take() {
            Some(Stage::Started(started)) => started,
            other => {
                ctx.stage = other;
                return Err(missing_stage("started"));
            }
        };

        let platform = ctx.platform;
        let address = ctx.controller().address(started.candidate().slot);
        let verdict = platform.probe(ctx.profile).poll(&address).await;

        let healthy = match started.confirm_health(&verdict) {
            Ok(healthy) => healthy,
            Err((started, err)) => {
                ctx.stage = Some(Stage::Started(started));
                return Err(err);
            }
        };
        let container = healthy.candidate().container.clone();
        ctx.stage = Some(Stage::Healthy(healthy));

        let mut detail = match &verdict {
            HealthVerdict::Healthy {
                attempts, elapsed, ..
            } => format!("healthy after {} attempts in {:.1?}", attempts, elapsed),
            _ => "healthy".to_string(),
        };
        let mut warn = false;

        if let HealthVerdict::Healthy { payload, .. } = &verdict {
            let failing = payload.failing_checks();
            if !failing.is_empty() {
                warn = true;
                detail.push_str(&format!("; failing checks: {}", failing.join(", ")));
            }
        }

        if platform.config.logs.enabled {
            match scan_container(platform.runtime.as_ref(), &container, platform.config.logs.tail)
                .await
            {
                Ok(findings) if !findings.is_empty() => {
                    warn = true;
                    detail.push_str(&format!("; {} error lines in logs", findings.len()));
                    for finding in findings {
                        ctx.diagnostics.warn(Warning::log_scan(finding.line));
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("log scan skipped: {}", e),
            }
        }

        Ok(if warn {
            GateOutcome::Warn(detail)
        } else {
            GateOutcome::Pass(detail)
        })
    }
}

/// Smoke suite against the candidate directly, bypassing the proxy. The
/// rollback profile runs only the critical checks.
pub struct SmokeGate;

#[async_trait]
impl Gate for SmokeGate {
    fn id(&self) -> GateId {
        GateId::Smoke
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let healthy = match ctx.stage.take() {
            Some(Stage::Healthy(healthy)) => healthy,
            other => {
                ctx.stage = other;
                return Err(missing_stage("healthy"));
            }
        };

        let config = &ctx.platform.config;
        let address = ctx.controller().address(healthy.candidate().slot);
        let client = HttpClient::new(config.smoke.timeout);

        let checks: Vec<&SmokeCheck> = config
            .smoke
            .checks
            .iter()
            .filter(|check| ctx.profile == Profile::Forward || check.critical)
            .collect();
        let mut report = run_checks(&client, &address, checks).await;

        if let Some(api_spec) = &config.api_spec {
            report.results.push(match check_routes(&client, &address, api_spec).await {
                Ok(routes) => {
                    tracing::debug!("{} registered {} routes", address, routes);
                    SmokeCheckResult::pass("api_spec")
                }
                Err(e) => SmokeCheckResult::fail("api_spec", e.to_string()),
            });
        }

        let summary = report.summary();
        match healthy.confirm_smoke(&report) {
            Ok(verified) => {
                ctx.stage = Some(Stage::Verified(verified));
                Ok(GateOutcome::Pass(summary))
            }
            Err((healthy, err)) => {
                ctx.stage = Some(Stage::Healthy(healthy));
                Err(err)
            }
        }
    }
}

/// Routes traffic to the verified candidate, then drains the previous instance.
pub struct CutoverGate;

#[async_trait]
impl Gate for CutoverGate {
    fn id(&self) -> GateId {
        GateId::Cutover
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let verified = match ctx.stage.take() {
            Some(Stage::Verified(verified)) => verified,
            other => {
                ctx.stage = other;
                return Err(missing_stage("verified"));
            }
        };

        let platform = ctx.platform;
        let controller = ctx.controller();
        let slot = verified.candidate().slot;
        let dial = controller.dial(slot);

        let routed = match verified.route(platform.proxy.as_ref(), &dial).await {
            Ok(routed) => routed,
            Err((verified, err)) => {
                ctx.stage = Some(Stage::Verified(verified));
                return Err(err);
            }
        };
        // Traffic has moved; from here on the only recovery is a rollback.
        ctx.service_mutated = true;
        ctx.record.slot = Some(slot);

        let grace = if routed.is_reused() {
            Duration::ZERO
        } else {
            platform.config.cleanup.grace_period
        };
        let (drained, problems) = routed.drain(&controller, grace).await;
        let mut warnings: Vec<String> = problems;

        if platform.config.cleanup.rebuild_idle_slot
            && let Err(e) = drained
                .rebuild_idle(&controller, ctx.lock, ctx.release)
                .await
        {
            warnings.push(format!("rebuilding idle slot: {e}"));
        }
        ctx.stage = Some(Stage::Drained(drained));

        let detail = format!("traffic on {} slot ({})", slot, dial);
        if warnings.is_empty() {
            return Ok(GateOutcome::Pass(detail));
        }
        for warning in &warnings {
            ctx.diagnostics.warn(Warning::cleanup(warning.clone()));
        }
        Ok(GateOutcome::Warn(format!("{}; {}", detail, warnings.join("; "))))
    }
}

/// Persists the final record. Always the last gate.
pub struct RecordGate;

#[async_trait]
impl Gate for RecordGate {
    fn id(&self) -> GateId {
        GateId::Record
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError> {
        let status = match ctx.profile {
            Profile::Forward => DeploymentStatus::Success,
            Profile::Rollback => DeploymentStatus::RolledBack,
        };
        let record = ctx.record.finalize(status, &ctx.results);
        ctx.platform.recorder().record(&record)?;
        ctx.record = record;
        Ok(GateOutcome::Pass(format!(
            "{} recorded as {}",
            ctx.release.name,
            status.as_str()
        )))
    }
}
