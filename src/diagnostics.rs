// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects problems that must not fail a gate but should be shown after the verdict.

use serde::Serialize;

/// Collects non-fatal warnings during pipeline operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }

    pub fn optional_service(message: impl Into<String>) -> Self {
        Self::new(WarningKind::OptionalService, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Hook, message)
    }

    pub fn log_scan(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LogScan, message)
    }

    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Cleanup, message)
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Discovery, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Lock file could not be removed and may need manual cleanup.
    LockRelease,
    /// A service marked `required: false` failed to restart.
    OptionalService,
    /// A non-fatal lifecycle hook failed.
    Hook,
    /// Error lines in the candidate's recent output.
    LogScan,
    /// Draining, stopping or rebuilding a slot after cutover.
    Cleanup,
    /// Live instance discovery fell back to container state.
    Discovery,
}
