// ABOUTME: Best-effort scan of a candidate's recent log output for errors.
// ABOUTME: Structured JSON records first; a raw-text heuristic only for lines that are not JSON.

use futures::StreamExt;
use serde::Deserialize;

use crate::runtime::{LogError, LogOps, LogOptions};
use crate::types::ContainerId;

const ERROR_LEVELS: &[&str] = &["error", "err", "critical", "crit", "fatal", "panic"];
const TEXT_MARKERS: &[&str] = &["traceback (most recent call last)", "panicked at", "fatal error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingSource {
    /// A JSON log record with an error level.
    Structured,
    /// Text heuristic on a non-JSON line; may be a false positive.
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFinding {
    pub source: FindingSource,
    pub line: String,
}

#[derive(Deserialize)]
struct LogRecord {
    #[serde(alias = "severity", alias = "lvl")]
    level: Option<String>,
}

pub fn scan_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<LogFinding> {
    lines
        .into_iter()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }

            let source = match serde_json::from_str::<LogRecord>(trimmed) {
                Ok(record) => record
                    .level
                    .filter(|level| ERROR_LEVELS.contains(&level.to_ascii_lowercase().as_str()))
                    .map(|_| FindingSource::Structured),
                Err(_) => {
                    let lower = trimmed.to_ascii_lowercase();
                    TEXT_MARKERS
                        .iter()
                        .any(|marker| lower.contains(marker))
                        .then_some(FindingSource::Heuristic)
                }
            }?;

            Some(LogFinding {
                source,
                line: trimmed.to_string(),
            })
        })
        .collect()
}

/// Read the last `tail` lines of a container's output and scan them.
pub async fn scan_container(
    logs: &(impl LogOps + ?Sized),
    id: &ContainerId,
    tail: u64,
) -> Result<Vec<LogFinding>, LogError> {
    let mut stream = logs.container_logs(id, &LogOptions::tail(tail)).await?;
    let mut lines = Vec::new();
    while let Some(line) = stream.next().await {
        lines.push(line?.content);
    }
    Ok(scan_lines(lines.iter().map(String::as_str)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_records_use_level() {
        let findings = scan_lines([
            r#"{"level":"info","msg":"listening"}"#,
            r#"{"level":"ERROR","msg":"db connect failed"}"#,
            r#"{"severity":"critical","message":"out of memory"}"#,
        ]);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.source == FindingSource::Structured));
    }

    #[test]
    fn json_messages_mentioning_traceback_are_not_flagged() {
        let findings = scan_lines([r#"{"level":"info","msg":"Traceback (most recent call last)"}"#]);
        assert!(findings.is_empty());
    }

    #[test]
    fn text_fallback_catches_tracebacks_and_panics() {
        let findings = scan_lines([
            "Traceback (most recent call last):",
            "thread 'main' panicked at src/main.rs:3:5",
            "GET /health 200",
        ]);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.source == FindingSource::Heuristic));
    }
}
