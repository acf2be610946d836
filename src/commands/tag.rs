// ABOUTME: Tag command implementation.
// ABOUTME: Creates an immutable release tag on the workspace HEAD.

use releasegate::error::Result;
use releasegate::output::Output;
use releasegate::vcs::{GitCli, ReleaseTagStore};
use std::path::Path;

use super::parse_tag;

pub async fn tag(workspace: &Path, version: &str, message: Option<&str>, output: &Output) -> Result<i32> {
    let name = parse_tag(version)?;
    let message = message
        .map(str::to_string)
        .unwrap_or_else(|| format!("Release {name}"));

    let git = GitCli::new(workspace);
    let release = ReleaseTagStore::new(&git).create(&name, &message).await?;

    output.success(&format!(
        "{} -> {}{}",
        release.name,
        release.commit.short(),
        release
            .pre_release()
            .map(|pre| format!(" (pre-release {pre})"))
            .unwrap_or_default()
    ));
    Ok(0)
}
