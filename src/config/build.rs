// ABOUTME: Build verification and smoke-test configuration.
// ABOUTME: Static check command, artifact build command and the smoke suite definition.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// File extensions (without dot) that the static check runs against.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Per-file check; the file path is appended as the last argument,
    /// e.g. `["python3", "-m", "py_compile"]`.
    #[serde(default)]
    pub check: Option<NonEmpty<String>>,

    /// Artifact build command. `{image}`, `{tag}` and `{commit}` are substituted.
    /// Without one, the tagged image is pulled from its registry instead.
    #[serde(default)]
    pub command: Option<NonEmpty<String>>,

    /// Directory names skipped by the static check walk.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    [".git", ".releasegate", "target", "node_modules", "__pycache__", ".venv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmokeConfig {
    /// Local smoke-test commands run from the workspace during build verification.
    #[serde(default)]
    pub commands: Vec<NonEmpty<String>>,

    /// HTTP checks run directly against a freshly started instance.
    #[serde(default)]
    pub checks: Vec<SmokeCheck>,

    #[serde(default = "default_smoke_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        SmokeConfig {
            commands: Vec::new(),
            checks: Vec::new(),
            timeout: default_smoke_timeout(),
        }
    }
}

fn default_smoke_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmokeCheck {
    pub name: String,

    pub path: String,

    #[serde(default = "default_expect_status")]
    pub expect_status: u16,

    /// Substring the response body must contain.
    #[serde(default)]
    pub contains: Option<String>,

    /// Critical checks form the reduced suite used when verifying a rollback.
    #[serde(default = "default_critical")]
    pub critical: bool,
}

fn default_expect_status() -> u16 {
    200
}

fn default_critical() -> bool {
    true
}
