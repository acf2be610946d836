// ABOUTME: Library root for releasegate - exposes the pipeline and its collaborators.
// ABOUTME: The CLI binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod hooks;
pub mod http;
pub mod output;
pub mod proxy;
pub mod runtime;
pub mod types;
pub mod vcs;
pub mod wait;
