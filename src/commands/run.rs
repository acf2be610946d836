// ABOUTME: Run command implementation.
// ABOUTME: Holds the deployment lock around the gate runner and fires lifecycle hooks.

use releasegate::config::Config;
use releasegate::deploy::{DeploymentLock, GateRunner, Platform};
use releasegate::diagnostics::{Diagnostics, Warning};
use releasegate::error::{Error, Result};
use releasegate::hooks::{HookContext, HookPoint, HookRunner};
use releasegate::output::Output;
use std::path::Path;

use super::parse_tag;

pub async fn run(
    workspace: &Path,
    config: Config,
    tag: &str,
    force_lock: bool,
    mut output: Output,
) -> Result<i32> {
    let tag = parse_tag(tag)?;
    output.start_timer();

    let platform = Platform::connect(config, workspace).await?;
    let hooks = HookRunner::new(workspace);
    let mut diag = Diagnostics::default();

    let lock = DeploymentLock::acquire(&platform.state_dir(), format!("run {tag}"), force_lock)?;

    let context = HookContext {
        service: platform.config.service.clone(),
        environment: platform.config.environment.clone(),
        operation: "run".to_string(),
        tag: tag.clone(),
        commit: None,
        previous_tag: platform.recorder().active()?.map(|r| r.tag),
        status: None,
    };

    if let Some(result) = hooks.run(HookPoint::PreRun, &context).await
        && !result.success
    {
        if !result.stderr.is_empty() {
            eprintln!("{}", result.stderr.trim_end());
        }
        return Err(Error::Hook("pre-run hook failed".to_string()));
    }

    output.progress(&format!(
        "Running release gates for {} ({}) in {}",
        tag, platform.config.service, platform.config.environment
    ));

    let verdict = GateRunner::new(&platform, &output).run(&tag, &lock).await?;

    let context = HookContext {
        commit: Some(verdict.commit.clone()),
        ..context.with_status(verdict.status.as_str())
    };
    let mut points = vec![if verdict.passed() {
        HookPoint::PostRun
    } else {
        HookPoint::OnFailure
    }];
    if verdict.rollback.is_some() {
        points.push(HookPoint::OnRollback);
    }
    for point in points {
        if let Some(result) = hooks.run(point, &context).await
            && !result.success
        {
            diag.warn(Warning::hook(format!("{} hook failed", point.filename())));
        }
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
