// ABOUTME: Command handlers for the releasegate CLI.
// ABOUTME: Each handler returns the process exit code.

mod drift;
mod init;
mod rollback;
mod run;
mod status;
mod tag;

pub use drift::drift_check;
pub use init::init;
pub use rollback::rollback;
pub use run::run;
pub use status::status;
pub use tag::tag;

use releasegate::config::Config;
use releasegate::error::{Error, Result};
use releasegate::types::TagName;
use std::path::Path;

/// Discover the config and apply the selected environment overlay.
pub fn load_config(workspace: &Path, environment: Option<&str>) -> Result<Config> {
    let config = Config::discover(workspace)?;
    match environment {
        None => Ok(config),
        Some(name) if name == config.environment && !config.environments.contains_key(name) => {
            Ok(config)
        }
        Some(name) => config.for_environment(name),
    }
}

fn parse_tag(tag: &str) -> Result<TagName> {
    TagName::parse(tag).map_err(|e| Error::InvalidTag(e.to_string()))
}
