// ABOUTME: Persisted deployment records: the current record plus an append-only history.
// ABOUTME: deployment.json is rewritten atomically; history.jsonl only ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::DeployError;
use super::gate::GateResult;
use crate::types::{CommitHash, Slot, TagName};

pub const RECORD_FILENAME: &str = "deployment.json";
pub const HISTORY_FILENAME: &str = "history.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Success,
    Failed,
    RolledBack,
}

impl DeploymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::RolledBack => "rolled_back",
        }
    }

    /// Whether a record with this status describes what is serving.
    pub fn is_active(self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::RolledBack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub environment: String,
    pub tag: TagName,
    pub commit: CommitHash,
    pub image: String,
    pub deployed_at: DateTime<Utc>,
    pub deployed_by: String,
    pub status: DeploymentStatus,
    pub previous_tag: Option<TagName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateResult>,
}

impl DeploymentRecord {
    pub fn pending(
        environment: impl Into<String>,
        tag: TagName,
        commit: CommitHash,
        image: impl Into<String>,
        previous_tag: Option<TagName>,
    ) -> Self {
        Self {
            environment: environment.into(),
            tag,
            commit,
            image: image.into(),
            deployed_at: Utc::now(),
            deployed_by: deployed_by(),
            status: DeploymentStatus::Pending,
            previous_tag,
            slot: None,
            blockers: Vec::new(),
            gates: Vec::new(),
        }
    }

    pub fn finalize(&self, status: DeploymentStatus, gates: &[GateResult]) -> Self {
        Self {
            status,
            deployed_at: Utc::now(),
            gates: gates.to_vec(),
            ..self.clone()
        }
    }
}

fn deployed_by() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = gethostname::gethostname().to_string_lossy().into_owned();
    format!("{user}@{host}")
}

/// Reads and writes the records of one environment.
#[derive(Debug, Clone)]
pub struct DeploymentRecorder {
    dir: PathBuf,
}

impl DeploymentRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `record` as the current record. Finalized records are
    /// also appended to the history.
    pub fn record(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        std::fs::create_dir_all(&self.dir).map_err(DeployError::record)?;

        let json = serde_json::to_string_pretty(record).map_err(DeployError::record)?;
        write_atomic(&self.dir.join(RECORD_FILENAME), json.as_bytes())?;

        if record.status != DeploymentStatus::Pending {
            let line = serde_json::to_string(record).map_err(DeployError::record)?;
            append_line(&self.dir.join(HISTORY_FILENAME), &line)?;
        }

        tracing::info!(
            "recorded {} {} as {:?}",
            record.environment,
            record.tag,
            record.status
        );
        Ok(())
    }

    /// The latest record, whatever its status.
    pub fn current(&self) -> Result<Option<DeploymentRecord>, DeployError> {
        let path = self.dir.join(RECORD_FILENAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| DeployError::record(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeployError::record(e)),
        }
    }

    /// Every finalized record, oldest first. Malformed lines are skipped.
    pub fn history(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        let path = self.dir.join(HISTORY_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DeployError::record(e)),
        };

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("skipping {}:{}: {}", path.display(), n + 1, e);
                    None
                }
            })
            .collect())
    }

    /// The record describing what should be serving: the most recent
    /// `success` or `rolled_back` record.
    pub fn active(&self) -> Result<Option<DeploymentRecord>, DeployError> {
        Ok(self
            .history()?
            .into_iter()
            .rev()
            .find(|record| record.status.is_active()))
    }

    /// Most recent successful deployment of `tag`.
    pub fn find_success(&self, tag: &TagName) -> Result<Option<DeploymentRecord>, DeployError> {
        Ok(self.history()?.into_iter().rev().find(|record| {
            record.status == DeploymentStatus::Success && record.tag.as_str() == tag.as_str()
        }))
    }
}

pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DeployError> {
    let tmp = path.with_extension("json.tmp");
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    };
    write().map_err(|e| DeployError::record(format!("{}: {}", path.display(), e)))
}

pub(crate) fn append_line(path: &Path, line: &str) -> Result<(), DeployError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DeployError::record(format!("{}: {}", path.display(), e)))?;
    writeln!(file, "{line}").map_err(|e| DeployError::record(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &str, status: DeploymentStatus) -> DeploymentRecord {
        DeploymentRecord::pending(
            "production",
            TagName::parse(tag).unwrap(),
            CommitHash::new("abcdef12").unwrap(),
            format!("app:{tag}"),
            None,
        )
        .finalize(status, &[])
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DeploymentStatus::RolledBack).unwrap();
        assert_eq!(json, r#""rolled_back""#);
    }

    #[test]
    fn pending_records_stay_out_of_history() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = DeploymentRecorder::new(dir.path());

        let pending = record("v1.0.0", DeploymentStatus::Pending);
        recorder.record(&pending).unwrap();

        assert_eq!(recorder.current().unwrap().unwrap().status, DeploymentStatus::Pending);
        assert!(recorder.history().unwrap().is_empty());
        assert!(recorder.active().unwrap().is_none());
    }

    #[test]
    fn active_skips_failed_records() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = DeploymentRecorder::new(dir.path());

        recorder.record(&record("v1.0.0", DeploymentStatus::Success)).unwrap();
        recorder.record(&record("v1.1.0", DeploymentStatus::Failed)).unwrap();

        assert_eq!(recorder.current().unwrap().unwrap().tag.as_str(), "v1.1.0");
        assert_eq!(recorder.active().unwrap().unwrap().tag.as_str(), "v1.0.0");
        assert!(recorder.find_success(&TagName::parse("v1.1.0").unwrap()).unwrap().is_none());
    }
}
