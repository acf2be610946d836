// ABOUTME: Release pipeline: gates, blue/green cutover type state, rollback and drift detection.
// ABOUTME: Exports the runner, its collaborators and the persisted record types.

mod build;
mod context;
mod cutover;
mod drift;
mod error;
mod gate;
mod gates;
mod lock;
mod platform;
mod record;
mod rollback;
mod runner;
mod service;
mod smoke;
mod state;
mod validate;

pub use build::{ArtifactOutcome, BuildVerifier};
pub use context::{Profile, RunContext, Stage};
pub use cutover::{Cutover, Transition};
pub use drift::{
    DRIFT_LOG_FILENAME, DRIFT_REPORT_FILENAME, DriftDetector, DriftFinding, DriftOutcome,
    DriftReport,
};
pub use error::{DeployError, DeployErrorKind};
pub use gate::{Gate, GateId, GateOutcome, GateResult, Outcome};
pub use gates::{forward_gates, rollback_gates};
pub use lock::{DeploymentLock, LOCK_FILENAME, LockInfo};
pub use platform::Platform;
pub use record::{
    DeploymentRecord, DeploymentRecorder, DeploymentStatus, HISTORY_FILENAME, RECORD_FILENAME,
};
pub use rollback::RollbackManager;
pub use runner::{Blocker, GateListener, GateRunner, Operation, Verdict, VerdictStatus};
pub use service::{
    AuxRestart, Instance, LABEL_COMMIT, LABEL_ENVIRONMENT, LABEL_ROLE, LABEL_SERVICE, LABEL_SLOT,
    LABEL_TAG, LiveInstance, ServiceController, ServiceHealth, ServiceState,
};
pub use smoke::{SmokeCheckResult, SmokeReport, run_checks};
pub use state::{Drained, Healthy, Routed, Started, Verified};
pub use validate::{CheckResult, EnvironmentValidator};
