// ABOUTME: Lifecycle hooks run around a release run or rollback.
// ABOUTME: Discovers executable scripts in .releasegate/hooks and passes context as RELEASEGATE_* env vars.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::types::{CommitHash, ServiceName, TagName};

/// Hook execution points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the first gate. Failure aborts the run.
    PreRun,
    /// After a successful run. Failure logs a warning.
    PostRun,
    /// After a failed run. Failure logs a warning.
    OnFailure,
    /// After a rollback, automatic or manual. Failure logs a warning.
    OnRollback,
}

impl HookPoint {
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreRun => "pre-run",
            HookPoint::PostRun => "post-run",
            HookPoint::OnFailure => "on-failure",
            HookPoint::OnRollback => "on-rollback",
        }
    }

    /// Whether failure at this hook point should abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreRun)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub service: ServiceName,
    pub environment: String,
    /// `run` or `rollback`.
    pub operation: String,
    pub tag: TagName,
    pub commit: Option<CommitHash>,
    pub previous_tag: Option<TagName>,
    /// Final status, once known.
    pub status: Option<String>,
}

impl HookContext {
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("RELEASEGATE_SERVICE".to_string(), self.service.to_string());
        env.insert(
            "RELEASEGATE_ENVIRONMENT".to_string(),
            self.environment.clone(),
        );
        env.insert("RELEASEGATE_OPERATION".to_string(), self.operation.clone());
        env.insert("RELEASEGATE_TAG".to_string(), self.tag.to_string());
        if let Some(ref commit) = self.commit {
            env.insert("RELEASEGATE_COMMIT".to_string(), commit.to_string());
        }
        if let Some(ref previous) = self.previous_tag {
            env.insert("RELEASEGATE_PREVIOUS_TAG".to_string(), previous.to_string());
        }
        if let Some(ref status) = self.status {
            env.insert("RELEASEGATE_STATUS".to_string(), status.clone());
        }
        env
    }

    pub fn with_status(&self, status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..self.clone()
        }
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    project_dir: PathBuf,
    hooks_dir: PathBuf,
}

impl HookRunner {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            hooks_dir: project_dir.join(".releasegate").join("hooks"),
        }
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .current_dir(&self.project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}
