// ABOUTME: Git implementation of the Vcs seam, shelling out to the git CLI.
// ABOUTME: Annotated tags are written; lightweight tags are read with commit metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{ReleaseTag, Vcs, VcsError};
use crate::types::{CommitHash, TagName};

const TAG_FORMAT: &str = "%(objectname)%00%(*objectname)%00%(taggername)%00%(taggerdate:iso-strict)%00%(committername)%00%(committerdate:iso-strict)%00%(contents)";

#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    program: String,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            program: "git".to_string(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(%command, "running git");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn head_commit(&self) -> Result<CommitHash, VcsError> {
        let out = self.run(&["rev-parse", "HEAD"]).await?;
        CommitHash::new(out.trim()).map_err(|e| VcsError::Parse {
            command: "git rev-parse HEAD".to_string(),
            detail: e.to_string(),
        })
    }

    async fn uncommitted_paths(&self) -> Result<Vec<PathBuf>, VcsError> {
        let out = self.run(&["status", "--porcelain=v1", "--untracked-files=no"])
            .await?;
        Ok(parse_porcelain(&out))
    }

    async fn read_tag(&self, tag: &TagName) -> Result<Option<ReleaseTag>, VcsError> {
        let refname = format!("refs/tags/{}", tag.as_str());
        let format = format!("--format={TAG_FORMAT}");
        let out = self.run(&["for-each-ref", &format, &refname]).await?;
        if out.trim().is_empty() {
            return Ok(None);
        }
        parse_tag_ref(tag, &out).map(Some)
    }

    async fn write_tag(
        &self,
        tag: &TagName,
        commit: &CommitHash,
        message: &str,
    ) -> Result<(), VcsError> {
        self.run(&["tag", "-a", tag.as_str(), commit.as_str(), "-m", message])
            .await?;
        Ok(())
    }
}

fn parse_porcelain(out: &str) -> Vec<PathBuf> {
    out.lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            // Renames are reported as "old -> new".
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            PathBuf::from(path.trim_matches('"'))
        })
        .collect()
}

fn parse_tag_ref(tag: &TagName, out: &str) -> Result<ReleaseTag, VcsError> {
    let parse_err = |detail: String| VcsError::Parse {
        command: format!("git for-each-ref refs/tags/{}", tag),
        detail,
    };

    let fields: Vec<&str> = out.splitn(7, '\0').collect();
    let [object, peeled, tagger, tagger_date, committer, committer_date, contents] =
        fields.as_slice()
    else {
        return Err(parse_err(format!("expected 7 fields, got {}", fields.len())));
    };

    // Annotated tags peel to the commit; lightweight tags point at it directly.
    let annotated = !peeled.is_empty();
    let commit = if annotated { peeled } else { object };
    let (creator, date) = if annotated {
        (tagger, tagger_date)
    } else {
        (committer, committer_date)
    };

    let commit = CommitHash::new(commit.trim()).map_err(|e| parse_err(e.to_string()))?;
    let created_at = DateTime::parse_from_rfc3339(date.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| parse_err(format!("bad date {date:?}: {e}")))?;

    Ok(ReleaseTag {
        name: tag.clone(),
        commit,
        message: if annotated {
            contents.trim().to_string()
        } else {
            String::new()
        },
        creator: creator.trim().to_string(),
        created_at,
    })
}
