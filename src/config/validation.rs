// ABOUTME: Pre-flight environment validation settings.
// ABOUTME: Runtime allow-list (path + semver requirement) and the dependency consistency command.

use nonempty::NonEmpty;
use semver::VersionReq;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub runtimes: Vec<RuntimeRequirement>,

    /// Command that must exit 0 when installed dependencies are consistent,
    /// e.g. `["pip", "check"]`.
    #[serde(default)]
    pub dependency_check: Option<NonEmpty<String>>,
}

/// An interpreter or toolchain binary the release depends on.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeRequirement {
    pub name: String,

    /// Binary name looked up on `PATH`, or an absolute path.
    pub command: String,

    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,

    /// Allowed versions, e.g. `">=3.11, <3.13"`.
    pub allowed: VersionReq,

    /// When set, the resolved binary must live under this directory.
    #[serde(default)]
    pub path_prefix: Option<PathBuf>,
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}
