// ABOUTME: Typed health endpoint response body.
// ABOUTME: Separates liveness (status) from readiness (ready flag or dependency checks).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const OK_WORDS: &[&str] = &["ok", "up", "healthy", "pass", "passing", "ready", "true"];
const FAILED_WORDS: &[&str] = &["down", "unhealthy", "fail", "failed", "failing", "error", "false"];

/// Body of `GET <health-endpoint>`. Only `status` is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    /// Per-dependency results, e.g. `{"database": "ok", "cache": {"status": "down"}}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, CheckStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckStatus {
    Flag(bool),
    Text(String),
    Detailed { status: String },
}

impl CheckStatus {
    pub fn is_ok(&self) -> bool {
        match self {
            CheckStatus::Flag(ok) => *ok,
            CheckStatus::Text(s) | CheckStatus::Detailed { status: s } => is_ok_word(s),
        }
    }
}

fn is_ok_word(s: &str) -> bool {
    OK_WORDS.contains(&s.trim().to_ascii_lowercase().as_str())
}

impl HealthPayload {
    /// Process is up and answering.
    pub fn is_live(&self) -> bool {
        let status = self.status.trim().to_ascii_lowercase();
        !status.is_empty() && !FAILED_WORDS.contains(&status.as_str())
    }

    /// Dependencies reachable. An explicit `ready` flag wins, then the
    /// dependency checks, then the status word.
    pub fn is_ready(&self) -> bool {
        if let Some(ready) = self.ready {
            return ready && self.is_live();
        }
        if !self.checks.is_empty() {
            return self.is_live() && self.checks.values().all(CheckStatus::is_ok);
        }
        is_ok_word(&self.status)
    }

    /// Names of dependency checks that are not OK.
    pub fn failing_checks(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|(_, status)| !status.is_ok())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> HealthPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn status_is_required() {
        assert!(serde_json::from_str::<HealthPayload>(r#"{"ready": true}"#).is_err());
    }

    #[test]
    fn explicit_ready_flag_wins() {
        let payload = parse(r#"{"status": "ok", "ready": false, "checks": {"db": "ok"}}"#);
        assert!(payload.is_live());
        assert!(!payload.is_ready());
    }

    #[test]
    fn readiness_from_dependency_checks() {
        let payload = parse(
            r#"{"status": "ok", "checks": {"database": {"status": "down"}, "cache": true}}"#,
        );
        assert!(payload.is_live());
        assert!(!payload.is_ready());
        assert_eq!(payload.failing_checks(), vec!["database".to_string()]);
    }

    #[test]
    fn readiness_from_status_word() {
        assert!(parse(r#"{"status": "healthy"}"#).is_ready());
        let starting = parse(r#"{"status": "starting"}"#);
        assert!(starting.is_live());
        assert!(!starting.is_ready());
        assert!(!parse(r#"{"status": "unhealthy"}"#).is_live());
    }
}
