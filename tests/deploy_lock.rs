// ABOUTME: Integration tests for the deployment lock.
// ABOUTME: Tests exclusive acquisition, stale and corrupted locks, force breaking and try_acquire.

use chrono::Utc;
use releasegate::deploy::{DeployError, DeployErrorKind, DeploymentLock, LOCK_FILENAME, LockInfo};
use std::fs;

fn write_lock(dir: &std::path::Path, info: &LockInfo) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(LOCK_FILENAME), serde_json::to_string(info).unwrap()).unwrap();
}

/// Test: a held lock prevents a second run.
#[test]
fn lock_acquired_prevents_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("production");

    let lock = DeploymentLock::acquire(&state, "run v1.0.0", false).expect("first lock");
    let err = DeploymentLock::acquire(&state, "run v1.1.0", false).unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Lock);
    match err {
        DeployError::LockHeld { operation, pid, .. } => {
            assert_eq!(operation, "run v1.0.0");
            assert_eq!(pid, std::process::id());
        }
        other => panic!("expected LockHeld, got {other:?}"),
    }

    lock.release().expect("release");
    let again = DeploymentLock::acquire(&state, "run v1.1.0", false).expect("lock after release");
    again.release().unwrap();
}

#[test]
fn lock_file_is_removed_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    {
        let _lock = DeploymentLock::acquire(dir.path(), "run v1.0.0", false).unwrap();
        assert!(dir.path().join(LOCK_FILENAME).exists());
    }
    assert!(!dir.path().join(LOCK_FILENAME).exists());
}

#[test]
fn stale_lock_is_broken() {
    let dir = tempfile::tempdir().unwrap();
    let mut stale = LockInfo::new("run v0.9.0");
    stale.started_at = Utc::now() - chrono::Duration::hours(3);
    write_lock(dir.path(), &stale);

    let lock = DeploymentLock::acquire(dir.path(), "run v1.0.0", false).expect("stale lock broken");
    assert_eq!(lock.info().operation, "run v1.0.0");
}

#[test]
fn corrupted_lock_is_broken() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(LOCK_FILENAME), "{not json").unwrap();

    assert!(DeploymentLock::acquire(dir.path(), "run", false).is_ok());
}

#[test]
fn force_breaks_live_lock() {
    let dir = tempfile::tempdir().unwrap();
    write_lock(dir.path(), &LockInfo::new("run v1.0.0"));

    assert!(DeploymentLock::acquire(dir.path(), "run v1.1.0", false).is_err());
    let lock = DeploymentLock::acquire(dir.path(), "run v1.1.0", true).expect("forced");

    let holder = DeploymentLock::holder(dir.path()).unwrap();
    assert_eq!(holder.operation, "run v1.1.0");
    lock.release().unwrap();
}

#[test]
fn try_acquire_reports_holder_without_breaking() {
    let dir = tempfile::tempdir().unwrap();
    let held = DeploymentLock::acquire(dir.path(), "rollback v1.0.0", false).unwrap();

    let holder = DeploymentLock::try_acquire(dir.path(), "drift-check")
        .unwrap()
        .expect_err("lock is held");
    assert_eq!(holder.operation, "rollback v1.0.0");
    assert!(dir.path().join(LOCK_FILENAME).exists());

    held.release().unwrap();
    let lock = DeploymentLock::try_acquire(dir.path(), "drift-check")
        .unwrap()
        .expect("free lock");
    assert_eq!(lock.info().operation, "drift-check");
}

#[test]
fn environments_lock_independently() {
    let dir = tempfile::tempdir().unwrap();
    let production = DeploymentLock::acquire(&dir.path().join("production"), "run", false).unwrap();
    let staging = DeploymentLock::acquire(&dir.path().join("staging"), "run", false).unwrap();
    production.release().unwrap();
    staging.release().unwrap();
}
