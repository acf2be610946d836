// ABOUTME: Rollback command implementation.
// ABOUTME: Validates the target and redeploys it through the reduced pipeline.

use releasegate::config::Config;
use releasegate::deploy::{DeploymentLock, Platform, RollbackManager};
use releasegate::diagnostics::{Diagnostics, Warning};
use releasegate::error::Result;
use releasegate::hooks::{HookContext, HookPoint, HookRunner};
use releasegate::output::Output;
use std::path::Path;

use super::parse_tag;

pub async fn rollback(
    workspace: &Path,
    config: Config,
    tag: &str,
    force_lock: bool,
    mut output: Output,
) -> Result<i32> {
    let tag = parse_tag(tag)?;
    output.start_timer();

    let platform = Platform::connect(config, workspace).await?;
    let mut diag = Diagnostics::default();
    let manager = RollbackManager::new(&platform, &output);

    // Refuse an invalid target before taking the lock.
    let target = manager.validate_target(&tag)?;

    let lock = DeploymentLock::acquire(
        &platform.state_dir(),
        format!("rollback {tag}"),
        force_lock,
    )?;
    let previous_tag = platform.recorder().active()?.map(|r| r.tag);

    output.progress(&format!(
        "Rolling back {} in {} to {} ({})",
        platform.config.service,
        platform.config.environment,
        tag,
        target.commit.short()
    ));

    let verdict = manager.rollback(&tag, &lock).await?;

    let context = HookContext {
        service: platform.config.service.clone(),
        environment: platform.config.environment.clone(),
        operation: "rollback".to_string(),
        tag: tag.clone(),
        commit: Some(verdict.commit.clone()),
        previous_tag,
        status: Some(verdict.status.as_str().to_string()),
    };
    if let Some(result) = HookRunner::new(workspace)
        .run(HookPoint::OnRollback, &context)
        .await
        && !result.success
    {
        diag.warn(Warning::hook("on-rollback hook failed"));
    }

    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(e.to_string()));
    }

    output.verdict(&verdict);
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    Ok(verdict.exit_code())
}
