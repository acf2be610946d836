// ABOUTME: Init command implementation.
// ABOUTME: Writes a releasegate.yml template into the workspace.

use releasegate::config::{self, CONFIG_FILENAME};
use releasegate::error::Result;
use releasegate::output::Output;
use std::path::Path;

pub fn init(
    workspace: &Path,
    service: Option<&str>,
    image: Option<&str>,
    force: bool,
    output: &Output,
) -> Result<i32> {
    config::init_config(workspace, service, image, force)?;
    output.success(&format!("Created {CONFIG_FILENAME}"));
    Ok(0)
}
