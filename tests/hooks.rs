// ABOUTME: Integration tests for hooks system.
// ABOUTME: Tests hook discovery, execution, and environment variable passing.

use releasegate::hooks::{HookContext, HookPoint, HookRunner};
use releasegate::types::{CommitHash, ServiceName, TagName};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn create_hook(dir: &TempDir, name: &str, script: &str) {
    let hooks_dir = dir.path().join(".releasegate").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();

    let hook_path = hooks_dir.join(name);
    fs::write(&hook_path, script).unwrap();

    // Make executable
    let mut perms = fs::metadata(&hook_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook_path, perms).unwrap();
}

fn test_context() -> HookContext {
    HookContext {
        service: ServiceName::new("shop").unwrap(),
        environment: "production".to_string(),
        operation: "run".to_string(),
        tag: TagName::parse("v1.1.0").unwrap(),
        commit: Some(CommitHash::new("abcdef1234").unwrap()),
        previous_tag: Some(TagName::parse("v1.0.0").unwrap()),
        status: None,
    }
}

/// Test: pre-run hook runs and its output is captured.
#[tokio::test]
async fn pre_run_hook_runs() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(&temp_dir, "pre-run", "#!/bin/sh\necho 'pre-run ran'\nexit 0\n");

    let runner = HookRunner::new(temp_dir.path());
    assert!(runner.hook_exists(HookPoint::PreRun));

    let result = runner
        .run(HookPoint::PreRun, &test_context())
        .await
        .expect("hook exists");
    assert!(result.success);
    assert!(result.stdout.contains("pre-run ran"));
}

/// Test: missing hooks are skipped.
#[tokio::test]
async fn missing_hook_returns_none() {
    let temp_dir = TempDir::new().unwrap();
    let runner = HookRunner::new(temp_dir.path());

    assert!(!runner.hook_exists(HookPoint::PostRun));
    assert!(runner.run(HookPoint::PostRun, &test_context()).await.is_none());
}

/// Test: failing hook reports its exit code and stderr.
#[tokio::test]
async fn failing_hook_reports_failure() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "pre-run",
        "#!/bin/sh\necho 'migrations pending' >&2\nexit 3\n",
    );

    let result = HookRunner::new(temp_dir.path())
        .run(HookPoint::PreRun, &test_context())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.stderr.contains("migrations pending"));
    assert!(HookPoint::PreRun.is_fatal());
}

/// Test: context is passed as RELEASEGATE_* variables.
#[tokio::test]
async fn hook_receives_environment_variables() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "on-rollback",
        r#"#!/bin/sh
echo "SERVICE=$RELEASEGATE_SERVICE"
echo "ENVIRONMENT=$RELEASEGATE_ENVIRONMENT"
echo "OPERATION=$RELEASEGATE_OPERATION"
echo "TAG=$RELEASEGATE_TAG"
echo "COMMIT=$RELEASEGATE_COMMIT"
echo "PREVIOUS=$RELEASEGATE_PREVIOUS_TAG"
echo "STATUS=$RELEASEGATE_STATUS"
"#,
    );

    let context = test_context().with_status("rollback_failed");
    let result = HookRunner::new(temp_dir.path())
        .run(HookPoint::OnRollback, &context)
        .await
        .unwrap();

    assert!(result.success);
    for expected in [
        "SERVICE=shop",
        "ENVIRONMENT=production",
        "OPERATION=run",
        "TAG=v1.1.0",
        "COMMIT=abcdef1234",
        "PREVIOUS=v1.0.0",
        "STATUS=rollback_failed",
    ] {
        assert!(result.stdout.contains(expected), "missing {expected} in {}", result.stdout);
    }
}

/// Test: hooks run from the project directory.
#[tokio::test]
async fn hook_runs_in_project_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("marker.txt"), "here").unwrap();
    create_hook(&temp_dir, "post-run", "#!/bin/sh\ncat marker.txt\n");

    let result = HookRunner::new(temp_dir.path())
        .run(HookPoint::PostRun, &test_context())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.stdout.trim(), "here");
}

/// Test: a hook file that is not executable reports failure instead of panicking.
#[tokio::test]
async fn non_executable_hook_fails_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let hooks_dir = temp_dir.path().join(".releasegate").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();
    fs::write(hooks_dir.join("on-failure"), "#!/bin/sh\nexit 0\n").unwrap();

    let result = HookRunner::new(temp_dir.path())
        .run(HookPoint::OnFailure, &test_context())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, None);
}
