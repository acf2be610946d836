// ABOUTME: Deployment lock serializing runs, rollbacks and drift checks per environment.
// ABOUTME: Atomic file creation with holder info; released on drop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::DeployError;

pub const LOCK_FILENAME: &str = "deploy.lock";

/// Information about who holds a deployment lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// `run v1.2.3`, `rollback v1.2.0`, `drift-check`.
    pub operation: String,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            operation: operation.into(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    fn into_error(self) -> DeployError {
        DeployError::LockHeld {
            holder: self.holder,
            pid: self.pid,
            operation: self.operation,
            started_at: self.started_at,
        }
    }
}

/// Outcome of inspecting an existing lock file.
enum Existing {
    Live(LockInfo),
    Breakable(String),
}

/// A held deployment lock. The file is removed when this is dropped,
/// including on early returns and panics.
#[derive(Debug)]
pub struct DeploymentLock {
    path: PathBuf,
    info: LockInfo,
    released: bool,
}

impl DeploymentLock {
    /// Acquire the lock in `state_dir`.
    ///
    /// Stale (>1 hour) and unreadable locks are broken with a warning;
    /// `force` breaks any lock.
    pub fn acquire(
        state_dir: &Path,
        operation: impl Into<String>,
        force: bool,
    ) -> Result<Self, DeployError> {
        let info = LockInfo::new(operation);
        let path = lock_path(state_dir)?;

        if create_lock_file(&path, &info)? {
            return Ok(Self::held(path, info));
        }

        match inspect_existing(&path) {
            Existing::Live(existing) if !force => return Err(existing.into_error()),
            Existing::Live(existing) => tracing::warn!(
                "breaking lock held by {} (pid {}, {}) since {}",
                existing.holder,
                existing.pid,
                existing.operation,
                existing.started_at
            ),
            Existing::Breakable(reason) => tracing::warn!("breaking {}", reason),
        }

        Self::break_and_retry(path, info)
    }

    /// Acquire the lock only if nobody holds it. A live lock is never broken;
    /// `Ok(Err(info))` describes the current holder.
    pub fn try_acquire(
        state_dir: &Path,
        operation: impl Into<String>,
    ) -> Result<Result<Self, LockInfo>, DeployError> {
        let info = LockInfo::new(operation);
        let path = lock_path(state_dir)?;

        if create_lock_file(&path, &info)? {
            return Ok(Ok(Self::held(path, info)));
        }

        match inspect_existing(&path) {
            Existing::Live(existing) => Ok(Err(existing)),
            Existing::Breakable(reason) => {
                tracing::warn!("breaking {}", reason);
                Self::break_and_retry(path, info).map(Ok)
            }
        }
    }

    /// Current holder of the lock in `state_dir`, if any.
    pub fn holder(state_dir: &Path) -> Option<LockInfo> {
        let content = std::fs::read_to_string(state_dir.join(LOCK_FILENAME)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting a failure to remove the file.
    pub fn release(mut self) -> Result<(), DeployError> {
        self.released = true;
        remove_lock_file(&self.path)
    }

    fn held(path: PathBuf, info: LockInfo) -> Self {
        tracing::debug!("acquired deployment lock {}", path.display());
        Self {
            path,
            info,
            released: false,
        }
    }

    fn break_and_retry(path: PathBuf, info: LockInfo) -> Result<Self, DeployError> {
        remove_lock_file(&path)?;
        if create_lock_file(&path, &info)? {
            Ok(Self::held(path, info))
        } else {
            Err(DeployError::Lock(
                "lock acquired by another process during break".to_string(),
            ))
        }
    }
}

impl Drop for DeploymentLock {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = remove_lock_file(&self.path)
        {
            tracing::warn!("{}", e);
        }
    }
}

fn lock_path(state_dir: &Path) -> Result<PathBuf, DeployError> {
    std::fs::create_dir_all(state_dir).map_err(|e| {
        DeployError::Lock(format!(
            "failed to create state directory {}: {}",
            state_dir.display(),
            e
        ))
    })?;
    Ok(state_dir.join(LOCK_FILENAME))
}

/// Atomically create the lock file. `Ok(false)` if it already exists.
fn create_lock_file(path: &Path, info: &LockInfo) -> Result<bool, DeployError> {
    let json = serde_json::to_string(info)
        .map_err(|e| DeployError::Lock(format!("failed to serialize lock: {}", e)))?;

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(json.as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| DeployError::Lock(format!("failed to write lock: {}", e)))?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(DeployError::Lock(format!(
            "failed to create {}: {}",
            path.display(),
            e
        ))),
    }
}

fn inspect_existing(path: &Path) -> Existing {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Existing::Breakable("unreadable lock".to_string()),
    };

    match serde_json::from_str::<LockInfo>(&content) {
        Ok(existing) if existing.is_stale() => Existing::Breakable(format!(
            "stale lock held by {} (pid {}) since {}",
            existing.holder, existing.pid, existing.started_at
        )),
        Ok(existing) => Existing::Live(existing),
        Err(_) => Existing::Breakable("corrupted lock".to_string()),
    }
}

fn remove_lock_file(path: &Path) -> Result<(), DeployError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DeployError::Lock(format!(
            "failed to remove lock {}: {}",
            path.display(),
            e
        ))),
    }
}
