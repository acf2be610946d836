// ABOUTME: Drift-check command implementation.
// ABOUTME: One-shot or interval-scheduled drift detection with optional automatic rollback.

use releasegate::config::Config;
use releasegate::deploy::{DeploymentLock, DriftDetector, DriftOutcome, Platform, RollbackManager};
use releasegate::error::Result;
use releasegate::output::Output;
use std::path::Path;
use std::time::Duration;

pub async fn drift_check(
    workspace: &Path,
    config: Config,
    every: Option<Duration>,
    auto_rollback: bool,
    output: &Output,
) -> Result<i32> {
    let platform = Platform::connect(config, workspace).await?;

    let Some(period) = every else {
        return check_once(&platform, auto_rollback, output).await;
    };

    output.progress(&format!(
        "Checking {} for drift every {}",
        platform.config.environment,
        humantime_serde::re::humantime::format_duration(period)
    ));
    let mut ticker = tokio::time::interval(period);
    let mut code = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                code = match check_once(&platform, auto_rollback, output).await {
                    Ok(code) => code,
                    Err(e) => {
                        output.error(&e.to_string());
                        1
                    }
                };
            }
            _ = tokio::signal::ctrl_c() => return Ok(code),
        }
    }
}

async fn check_once(platform: &Platform, auto_rollback: bool, output: &Output) -> Result<i32> {
    let detector = DriftDetector::new(platform);

    let report = match detector.check().await? {
        DriftOutcome::Deferred(holder) => {
            output.drift_deferred(&holder);
            return Ok(0);
        }
        DriftOutcome::Report(report) => report,
    };

    if let Err(e) = detector.persist(&report) {
        output.warning(&format!("drift report not saved: {e}"));
    }
    output.drift(&report);

    if auto_rollback
        && report.mismatch()
        && let Some(target) = &report.expected_tag
    {
        let lock = DeploymentLock::acquire(
            &platform.state_dir(),
            format!("rollback {target}"),
            false,
        )?;
        output.progress(&format!("Rolling back to deployed tag {target}"));
        let verdict = RollbackManager::new(platform, output)
            .rollback(target, &lock)
            .await?;
        if let Err(e) = lock.release() {
            output.warning(&e.to_string());
        }
        output.verdict(&verdict);
        if verdict.exit_code() == 2 {
            return Ok(2);
        }
    }

    Ok(if report.is_clean() { 0 } else { 1 })
}
