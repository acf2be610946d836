// ABOUTME: The Gate seam and the immutable per-gate results a run produces.
// ABOUTME: A gate either passes, passes with a warning, or fails with a DeployError.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::DeployError;
use super::context::RunContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    Environment,
    Build,
    Artifact,
    Services,
    Health,
    Smoke,
    Cutover,
    Record,
}

impl GateId {
    pub fn as_str(self) -> &'static str {
        match self {
            GateId::Environment => "environment",
            GateId::Build => "build",
            GateId::Artifact => "artifact",
            GateId::Services => "services",
            GateId::Health => "health",
            GateId::Smoke => "smoke",
            GateId::Cutover => "cutover",
            GateId::Record => "record",
        }
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "PASS",
            Outcome::Warn => "WARN",
            Outcome::Fail => "FAIL",
        })
    }
}

/// What a successful gate reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Pass(String),
    Warn(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateId,
    /// 1-based position in the run.
    pub ordinal: usize,
    pub outcome: Outcome,
    pub detail: String,
    /// Error category name for failed gates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GateResult {
    pub fn from_outcome(gate: GateId, ordinal: usize, outcome: GateOutcome) -> Self {
        let (outcome, detail) = match outcome {
            GateOutcome::Pass(detail) => (Outcome::Pass, detail),
            GateOutcome::Warn(detail) => (Outcome::Warn, detail),
        };
        Self {
            gate,
            ordinal,
            outcome,
            detail,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(gate: GateId, ordinal: usize, error: &DeployError) -> Self {
        Self {
            gate,
            ordinal,
            outcome: Outcome::Fail,
            detail: error.to_string(),
            error: Some(error.kind().name().to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// One named step of the pipeline.
#[async_trait]
pub trait Gate: Send + Sync {
    fn id(&self) -> GateId;

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<GateOutcome, DeployError>;
}
