// ABOUTME: Application-wide error types for releasegate.
// ABOUTME: Uses thiserror; deployment failures wrap DeployError.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::DeployError;
use crate::runtime::RuntimeError;
use crate::vcs::VcsError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid release tag: {0}")]
    InvalidTag(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
