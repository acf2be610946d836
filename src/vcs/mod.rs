// ABOUTME: Version-control seam and the release tag store built on it.
// ABOUTME: Tags are immutable: creating an existing tag on another commit is refused.

mod git;

pub use git::GitCli;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{CommitHash, TagName};

/// Errors from version-control operations.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected output from {command}: {detail}")]
    Parse { command: String, detail: String },

    #[error("release tag not found: {0}")]
    TagNotFound(String),

    #[error("release tag {tag} already points at {existing}, refusing to move it to {requested}")]
    TagConflict {
        tag: String,
        existing: CommitHash,
        requested: CommitHash,
    },
}

/// An immutable, version-identified pointer to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTag {
    pub name: TagName,
    pub commit: CommitHash,
    pub message: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
}

impl ReleaseTag {
    pub fn pre_release(&self) -> Option<&str> {
        self.name.pre_release()
    }
}

/// Operations the pipeline needs from version control.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Commit currently checked out in the workspace.
    async fn head_commit(&self) -> Result<CommitHash, VcsError>;

    /// Tracked paths with uncommitted modifications (untracked files are ignored).
    async fn uncommitted_paths(&self) -> Result<Vec<PathBuf>, VcsError>;

    async fn read_tag(&self, tag: &TagName) -> Result<Option<ReleaseTag>, VcsError>;

    async fn write_tag(
        &self,
        tag: &TagName,
        commit: &CommitHash,
        message: &str,
    ) -> Result<(), VcsError>;
}

/// Resolves and creates release tags.
pub struct ReleaseTagStore<'a> {
    vcs: &'a dyn Vcs,
}

impl<'a> ReleaseTagStore<'a> {
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs }
    }

    pub async fn resolve(&self, tag: &TagName) -> Result<ReleaseTag, VcsError> {
        self.vcs
            .read_tag(tag)
            .await?
            .ok_or_else(|| VcsError::TagNotFound(tag.to_string()))
    }

    /// Tag the workspace HEAD. Re-creating a tag on the commit it already
    /// names returns the existing tag unchanged.
    pub async fn create(&self, tag: &TagName, message: &str) -> Result<ReleaseTag, VcsError> {
        let head = self.vcs.head_commit().await?;

        if let Some(existing) = self.vcs.read_tag(tag).await? {
            if existing.commit.matches(&head) {
                tracing::info!("tag {} already exists on {}", tag, head.short());
                return Ok(existing);
            }
            return Err(VcsError::TagConflict {
                tag: tag.to_string(),
                existing: existing.commit,
                requested: head,
            });
        }

        self.vcs.write_tag(tag, &head, message).await?;
        tracing::info!("created tag {} on {}", tag, head.short());
        self.resolve(tag).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct MemoryVcs {
        head: Mutex<CommitHash>,
        tags: Mutex<HashMap<String, ReleaseTag>>,
    }

    impl MemoryVcs {
        fn at(commit: &str) -> Self {
            Self {
                head: Mutex::new(CommitHash::new(commit).unwrap()),
                tags: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl Vcs for MemoryVcs {
        async fn head_commit(&self) -> Result<CommitHash, VcsError> {
            Ok(self.head.lock().clone())
        }

        async fn uncommitted_paths(&self) -> Result<Vec<PathBuf>, VcsError> {
            Ok(Vec::new())
        }

        async fn read_tag(&self, tag: &TagName) -> Result<Option<ReleaseTag>, VcsError> {
            Ok(self.tags.lock().get(tag.as_str()).cloned())
        }

        async fn write_tag(
            &self,
            tag: &TagName,
            commit: &CommitHash,
            message: &str,
        ) -> Result<(), VcsError> {
            self.tags.lock().insert(
                tag.to_string(),
                ReleaseTag {
                    name: tag.clone(),
                    commit: commit.clone(),
                    message: message.to_string(),
                    creator: "test".to_string(),
                    created_at: Utc::now(),
                },
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn create_then_resolve() {
        let vcs = MemoryVcs::at("aaaaaaa1");
        let store = ReleaseTagStore::new(&vcs);
        let tag = TagName::parse("v1.0.0").unwrap();

        let created = store.create(&tag, "first").await.unwrap();
        assert_eq!(created.commit.as_str(), "aaaaaaa1");
        assert_eq!(store.resolve(&tag).await.unwrap(), created);
    }

    #[tokio::test]
    async fn recreate_on_same_commit_is_idempotent() {
        let vcs = MemoryVcs::at("aaaaaaa1");
        let store = ReleaseTagStore::new(&vcs);
        let tag = TagName::parse("v1.0.0").unwrap();

        let first = store.create(&tag, "first").await.unwrap();
        let second = store.create(&tag, "second message").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tag_is_never_moved_to_another_commit() {
        let vcs = MemoryVcs::at("aaaaaaa1");
        let store = ReleaseTagStore::new(&vcs);
        let tag = TagName::parse("v1.0.0").unwrap();
        store.create(&tag, "first").await.unwrap();

        *vcs.head.lock() = CommitHash::new("bbbbbbb2").unwrap();
        let err = store.create(&tag, "moved").await.unwrap_err();
        assert!(matches!(err, VcsError::TagConflict { .. }));
        assert_eq!(store.resolve(&tag).await.unwrap().commit.as_str(), "aaaaaaa1");
    }

    #[tokio::test]
    async fn resolve_missing_tag() {
        let vcs = MemoryVcs::at("aaaaaaa1");
        let store = ReleaseTagStore::new(&vcs);
        let err = store
            .resolve(&TagName::parse("v9.9.9").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::TagNotFound(_)));
    }
}
