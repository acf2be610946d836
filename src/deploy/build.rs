// ABOUTME: Build verification: static per-file checks, local smoke commands and the artifact.
// ABOUTME: Never touches running services, so a failure here needs no rollback.

use nonempty::NonEmpty;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use walkdir::WalkDir;

use super::DeployError;
use crate::config::{BuildConfig, SmokeConfig};
use crate::runtime::ServiceRuntime;
use crate::types::{ImageId, ImageRef};
use crate::vcs::ReleaseTag;

/// How the release's image came to be available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Already present locally; nothing was built.
    Present(ImageId),
    Built,
    Pulled,
}

impl ArtifactOutcome {
    pub fn describe(&self, image: &ImageRef) -> String {
        match self {
            ArtifactOutcome::Present(id) => format!("{} present ({})", image, id.short()),
            ArtifactOutcome::Built => format!("{} built", image),
            ArtifactOutcome::Pulled => format!("{} pulled", image),
        }
    }
}

pub struct BuildVerifier<'a> {
    build: &'a BuildConfig,
    smoke: &'a SmokeConfig,
    workspace: &'a Path,
}

impl<'a> BuildVerifier<'a> {
    pub fn new(build: &'a BuildConfig, smoke: &'a SmokeConfig, workspace: &'a Path) -> Self {
        Self {
            build,
            smoke,
            workspace,
        }
    }

    /// Source files the static check applies to.
    pub fn source_files(&self) -> Vec<PathBuf> {
        if self.build.sources.is_empty() {
            return Vec::new();
        }

        WalkDir::new(self.workspace)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry.depth() > 0
                    && self
                        .build
                        .exclude
                        .iter()
                        .any(|ex| entry.file_name().to_str() == Some(ex.as_str())))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| self.build.sources.iter().any(|s| s == ext))
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Run the per-file check on every source file and report every offender.
    /// Returns the number of files checked.
    pub async fn static_check(&self) -> Result<usize, DeployError> {
        let Some(check) = &self.build.check else {
            return Ok(0);
        };

        let files = self.source_files();
        let mut failed = Vec::new();

        for file in &files {
            let status = Command::new(check.head.as_str())
                .args(&check.tail)
                .arg(file)
                .current_dir(self.workspace)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| DeployError::Build(format!("failed to run {}: {}", check.head, e)))?;

            if !status.success() {
                let relative = file.strip_prefix(self.workspace).unwrap_or(file);
                tracing::debug!("static check failed: {}", relative.display());
                failed.push(relative.to_path_buf());
            }
        }

        if !failed.is_empty() {
            return Err(DeployError::StaticCheck { paths: failed });
        }
        Ok(files.len())
    }

    /// Run the local smoke commands; the first non-zero exit fails.
    pub async fn run_smoke_commands(&self) -> Result<usize, DeployError> {
        for argv in &self.smoke.commands {
            let output = run_in(self.workspace, argv).await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
                return Err(DeployError::Build(format!(
                    "smoke command `{}` exited with {}{}",
                    join(argv),
                    output.status,
                    if last.is_empty() {
                        String::new()
                    } else {
                        format!(": {}", last.trim())
                    }
                )));
            }
        }
        Ok(self.smoke.commands.len())
    }

    /// Make sure the release image exists: reuse it, build it (when allowed
    /// and a build command is configured), or pull it.
    pub async fn ensure_artifact(
        &self,
        runtime: &dyn ServiceRuntime,
        image: &ImageRef,
        release: &ReleaseTag,
        allow_build: bool,
    ) -> Result<ArtifactOutcome, DeployError> {
        if let Some(id) = runtime.image_id(image).await? {
            tracing::debug!("{} already present, skipping build", image);
            return Ok(ArtifactOutcome::Present(id));
        }

        match &self.build.command {
            Some(command) if allow_build => {
                let argv = command.clone().map(|arg| substitute(&arg, image, release));
                tracing::info!("building {}", image);
                let output = run_in(self.workspace, &argv).await?;
                if !output.status.success() {
                    return Err(DeployError::Build(format!(
                        "`{}` exited with {}: {}",
                        join(&argv),
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                Ok(ArtifactOutcome::Built)
            }
            _ => {
                tracing::info!("pulling {}", image);
                runtime.pull_image(image).await?;
                Ok(ArtifactOutcome::Pulled)
            }
        }
    }
}

async fn run_in(dir: &Path, argv: &NonEmpty<String>) -> Result<std::process::Output, DeployError> {
    Command::new(argv.head.as_str())
        .args(&argv.tail)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DeployError::Build(format!("failed to run {}: {}", argv.head, e)))
}

fn join(argv: &NonEmpty<String>) -> String {
    argv.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn substitute(arg: &str, image: &ImageRef, release: &ReleaseTag) -> String {
    arg.replace("{image}", &image.to_string())
        .replace("{tag}", release.name.as_str())
        .replace("{commit}", release.commit.as_str())
}
