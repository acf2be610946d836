// ABOUTME: Pre-flight environment checks run before anything is changed.
// ABOUTME: Workspace cleanliness, HEAD vs tag, runtime allow-list and dependency consistency.

use regex::Regex;
use semver::Version;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::DeployError;
use crate::config::{RuntimeRequirement, ValidationConfig};
use crate::vcs::{ReleaseTag, Vcs};

/// One passed check, in the order it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub detail: String,
}

impl CheckResult {
    fn new(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
        }
    }
}

/// Read-only validation of the local workspace and toolchain.
pub struct EnvironmentValidator<'a> {
    vcs: &'a dyn Vcs,
    config: &'a ValidationConfig,
    workspace: &'a Path,
}

impl<'a> EnvironmentValidator<'a> {
    pub fn new(vcs: &'a dyn Vcs, config: &'a ValidationConfig, workspace: &'a Path) -> Self {
        Self {
            vcs,
            config,
            workspace,
        }
    }

    /// Run every check, stopping at the first failure.
    pub async fn validate(&self, release: &ReleaseTag) -> Result<Vec<CheckResult>, DeployError> {
        let mut passed = vec![
            self.workspace_clean().await?,
            self.head_matches(release).await?,
        ];
        for requirement in &self.config.runtimes {
            passed.push(check_runtime(requirement).await?);
        }
        if let Some(check) = self.dependency_check().await? {
            passed.push(check);
        }
        Ok(passed)
    }

    pub async fn workspace_clean(&self) -> Result<CheckResult, DeployError> {
        let dirty = self.vcs.uncommitted_paths().await?;
        if !dirty.is_empty() {
            let paths: Vec<String> = dirty.iter().map(|p| p.display().to_string()).collect();
            return Err(DeployError::validation(
                "workspace",
                format!("uncommitted changes in {}", paths.join(", ")),
            ));
        }
        Ok(CheckResult::new("workspace", "clean"))
    }

    pub async fn head_matches(&self, release: &ReleaseTag) -> Result<CheckResult, DeployError> {
        let head = self.vcs.head_commit().await?;
        if !head.matches(&release.commit) {
            return Err(DeployError::validation(
                "revision",
                format!(
                    "workspace is at {}, {} points at {}",
                    head.short(),
                    release.name,
                    release.commit.short()
                ),
            ));
        }
        Ok(CheckResult::new(
            "revision",
            format!("HEAD at {}", head.short()),
        ))
    }

    async fn dependency_check(&self) -> Result<Option<CheckResult>, DeployError> {
        let Some(argv) = &self.config.dependency_check else {
            return Ok(None);
        };

        let output = Command::new(argv.head.as_str())
            .args(&argv.tail)
            .current_dir(self.workspace)
            .output()
            .await
            .map_err(|e| DeployError::validation("dependencies", format!("{}: {}", argv.head, e)))?;

        if !output.status.success() {
            let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
                .lines()
                .chain(String::from_utf8_lossy(&output.stderr).lines())
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if lines.is_empty() {
                lines.push(format!("{} exited with {}", argv.head, output.status));
            }
            return Err(DeployError::validation("dependencies", lines.join("; ")));
        }

        Ok(Some(CheckResult::new("dependencies", "consistent")))
    }
}

async fn check_runtime(requirement: &RuntimeRequirement) -> Result<CheckResult, DeployError> {
    let check = format!("runtime {}", requirement.name);

    let resolved = resolve_command(&requirement.command).ok_or_else(|| {
        DeployError::validation(&check, format!("{} not found on PATH", requirement.command))
    })?;

    if let Some(prefix) = &requirement.path_prefix
        && !resolved.starts_with(prefix)
    {
        return Err(DeployError::validation(
            &check,
            format!(
                "{} resolves outside {}",
                resolved.display(),
                prefix.display()
            ),
        ));
    }

    let output = Command::new(&resolved)
        .args(&requirement.version_args)
        .output()
        .await
        .map_err(|e| DeployError::validation(&check, e.to_string()))?;
    // Some interpreters print their version on stderr.
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let version = extract_version(&text).ok_or_else(|| {
        DeployError::validation(&check, format!("no version in output {:?}", text.trim()))
    })?;

    if !requirement.allowed.matches(&version) {
        return Err(DeployError::validation(
            &check,
            format!("version {} not allowed by {}", version, requirement.allowed),
        ));
    }

    Ok(CheckResult::new(
        check,
        format!("{} at {}", version, resolved.display()),
    ))
}

/// Look a binary up the way the shell would.
fn resolve_command(command: &str) -> Option<PathBuf> {
    let direct = Path::new(command);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}

/// First `major.minor[.patch]` in `text`; a missing patch reads as 0.
pub(crate) fn extract_version(text: &str) -> Option<Version> {
    let pattern = Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").ok()?;
    let caps = pattern.captures(text)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}
