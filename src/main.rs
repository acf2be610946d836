// ABOUTME: Entry point for the releasegate CLI application.
// ABOUTME: Parses arguments, initializes logging and maps command results to exit codes.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use releasegate::error::Result;
use releasegate::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let code = match run(cli, Output::new(mode)).await {
        Ok(code) => code,
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, output: Output) -> Result<i32> {
    let workspace = env::current_dir()?;
    let environment = cli.environment.as_deref();

    match cli.command {
        Commands::Init {
            service,
            image,
            force,
        } => commands::init(&workspace, service.as_deref(), image.as_deref(), force, &output),
        Commands::Tag { version, message } => {
            commands::tag(&workspace, &version, message.as_deref(), &output).await
        }
        Commands::Run { tag, force_lock } => {
            let config = commands::load_config(&workspace, environment)?;
            commands::run(&workspace, config, &tag, force_lock, output).await
        }
        Commands::Rollback { tag, force_lock } => {
            let config = commands::load_config(&workspace, environment)?;
            commands::rollback(&workspace, config, &tag, force_lock, output).await
        }
        Commands::DriftCheck {
            every,
            auto_rollback,
        } => {
            let config = commands::load_config(&workspace, environment)?;
            commands::drift_check(&workspace, config, every, auto_rollback, &output).await
        }
        Commands::Status => {
            let config = commands::load_config(&workspace, environment)?;
            commands::status(&workspace, config, &output).await
        }
    }
}
