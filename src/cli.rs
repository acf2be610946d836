// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "releasegate")]
#[command(about = "Release gate and blue-green rollout orchestrator for containerized services")]
#[command(version)]
pub struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only gate lines and the verdict
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// One JSON object per line
    #[arg(long, global = true)]
    pub json: bool,

    /// Target environment (defined in config)
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a releasegate.yml template
    Init {
        /// Service name
        #[arg(long)]
        service: Option<String>,

        /// Image repository, without tag
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Create an immutable release tag on the current commit
    Tag {
        /// Version, e.g. v1.2.3
        version: String,

        /// Annotation message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run every release gate for a tag and cut traffic over
    Run {
        tag: String,

        /// Break an existing deployment lock
        #[arg(long)]
        force_lock: bool,
    },

    /// Redeploy a previously successful tag with the reduced pipeline
    Rollback {
        tag: String,

        /// Break an existing deployment lock
        #[arg(long)]
        force_lock: bool,
    },

    /// Compare running state against the deployed record
    DriftCheck {
        /// Repeat on this interval, e.g. 5m
        #[arg(long, value_parser = parse_duration)]
        every: Option<Duration>,

        /// Roll back to the deployed tag when the running commit differs
        #[arg(long)]
        auto_rollback: bool,
    },

    /// Show the current deployment record and service states
    Status,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}
