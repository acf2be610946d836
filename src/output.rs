// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Gate lines, the verdict block and drift reports in normal, quiet (CI) and JSON modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{
    DeploymentRecord, DriftReport, GateListener, GateResult, LockInfo, ServiceState, Verdict,
    VerdictStatus,
};
use crate::types::TagName;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Gate lines and the verdict only, for CI
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event("success", message),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => self.event("warning", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&self.json_event("error", message)) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// One line per finished gate.
    pub fn gate(&self, result: &GateResult) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{}", gate_line(result)),
            OutputMode::Json => print_json(&Tagged {
                event: "gate",
                body: result,
            }),
        }
    }

    /// The final verdict: tag and commit under evaluation, tallies, every
    /// blocker by name, then collected warnings.
    pub fn verdict(&self, verdict: &Verdict) {
        if self.mode == OutputMode::Json {
            print_json(&Tagged {
                event: "verdict",
                body: verdict,
            });
            return;
        }

        println!();
        print!("{}", verdict_block(verdict));
        if self.mode == OutputMode::Normal && self.start_time.is_some() {
            println!("elapsed:  {:.1}s", self.elapsed_secs());
        }
    }

    pub fn drift(&self, report: &DriftReport) {
        if self.mode == OutputMode::Json {
            print_json(&Tagged {
                event: "drift",
                body: report,
            });
            return;
        }

        let expected = report
            .expected_tag
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let commit = |c: &Option<crate::types::CommitHash>| {
            c.as_ref()
                .map(|c| c.short().to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        println!("environment: {}", report.environment);
        println!(
            "deployed:    {} ({})",
            expected,
            commit(&report.expected_commit)
        );
        println!("running:     {}", commit(&report.actual_commit));
        if report.is_clean() {
            println!("no drift");
            return;
        }
        println!("FINDINGS:");
        for finding in &report.findings {
            println!("  - {finding}");
        }
    }

    pub fn drift_deferred(&self, holder: &LockInfo) {
        let message = format!(
            "drift check deferred: {} on {} (pid {}) holds the deployment lock since {}",
            holder.operation, holder.holder, holder.pid, holder.started_at
        );
        match self.mode {
            OutputMode::Json => self.event("deferred", &message),
            _ => println!("{message}"),
        }
    }

    pub fn status(&self, record: Option<&DeploymentRecord>, states: &[ServiceState]) {
        if self.mode == OutputMode::Json {
            #[derive(Serialize)]
            struct Status<'a> {
                record: Option<&'a DeploymentRecord>,
                services: &'a [ServiceState],
            }
            print_json(&Tagged {
                event: "status",
                body: &Status {
                    record,
                    services: states,
                },
            });
            return;
        }

        match record {
            Some(r) => {
                println!("environment: {}", r.environment);
                println!("tag:         {}", r.tag);
                println!("commit:      {}", r.commit.short());
                println!("status:      {}", r.status.as_str());
                println!("deployed:    {} by {}", r.deployed_at, r.deployed_by);
                if let Some(slot) = r.slot {
                    println!("slot:        {slot}");
                }
            }
            None => println!("no deployment recorded"),
        }

        if !states.is_empty() {
            println!("services:");
            for state in states {
                let slot = state
                    .slot
                    .map(|s| format!(" [{s}]"))
                    .unwrap_or_default();
                println!(
                    "  {}{}: {:?}, {} restarts, checked {}",
                    state.service,
                    slot,
                    state.health,
                    state.restart_count,
                    state.last_checked_at.format("%H:%M:%S")
                );
            }
        }
    }

    fn event(&self, event: &str, message: &str) {
        print_json(&self.json_event(event, message));
    }

    fn json_event<'a>(&self, event: &'a str, message: &'a str) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message,
            duration_secs: if self.start_time.is_some() {
                Some(self.elapsed_secs())
            } else {
                None
            },
        }
    }
}

impl GateListener for Output {
    fn gate_finished(&self, result: &GateResult) {
        self.gate(result);
    }

    fn rollback_started(&self, target: &TagName) {
        match self.mode {
            OutputMode::Json => self.event("rollback", &format!("rolling back to {target}")),
            _ => println!("rolling back to {target}"),
        }
    }
}

fn gate_line(result: &GateResult) -> String {
    format!(
        "[{}] {} {:<11} {}",
        result.outcome, result.ordinal, result.gate, result.detail
    )
}

fn status_label(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Success => "SUCCESS",
        VerdictStatus::Failed => "FAILED",
        VerdictStatus::RollbackFailed => "ROLLBACK FAILED (manual intervention required)",
    }
}

pub fn verdict_block(verdict: &Verdict) -> String {
    let mut out = String::new();
    let (passed, warned, failed) = verdict.tally();

    out.push_str("VERDICT\n");
    out.push_str(&format!("tag:      {}\n", verdict.tag));
    out.push_str(&format!("commit:   {}\n", verdict.commit));
    out.push_str(&format!("env:      {}\n", verdict.environment));
    out.push_str(&format!(
        "gates:    {} passed, {} warned, {} failed\n",
        passed, warned, failed
    ));

    if let Some(rollback) = &verdict.rollback {
        let (rb_passed, _, rb_failed) = rollback.tally();
        out.push_str(&format!(
            "rollback: {} {} ({} passed, {} failed)\n",
            rollback.tag,
            status_label(rollback.status),
            rb_passed,
            rb_failed
        ));
    }

    out.push_str(&format!("status:   {}\n", status_label(verdict.status)));

    if !verdict.blockers.is_empty() {
        out.push_str("BLOCKERS:\n");
        for blocker in &verdict.blockers {
            match blocker.gate {
                Some(gate) => out.push_str(&format!(
                    "  - {} [{}] {}\n",
                    gate, blocker.kind, blocker.message
                )),
                None => out.push_str(&format!("  - [{}] {}\n", blocker.kind, blocker.message)),
            }
        }
    }

    let warnings = verdict.all_warnings();
    if !warnings.is_empty() {
        out.push_str("WARNINGS:\n");
        for warning in warnings {
            out.push_str(&format!("  - {}\n", warning.message));
        }
    }

    out
}

fn print_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    event: &'a str,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
