// ABOUTME: Status command implementation.
// ABOUTME: Prints the current deployment record and, when the runtime is reachable, service states.

use releasegate::config::Config;
use releasegate::deploy::{DeploymentRecorder, Platform};
use releasegate::error::Result;
use releasegate::output::Output;
use std::path::Path;

pub async fn status(workspace: &Path, config: Config, output: &Output) -> Result<i32> {
    let recorder = DeploymentRecorder::new(config.environment_state_dir(workspace));
    let record = recorder.current()?;

    let states = match Platform::connect(config, workspace).await {
        Ok(platform) => match platform.controller().service_states().await {
            Ok(states) => states,
            Err(e) => {
                output.warning(&format!("cannot read service states: {e}"));
                Vec::new()
            }
        },
        Err(e) => {
            output.warning(&format!("runtime unavailable: {e}"));
            Vec::new()
        }
    };

    output.status(record.as_ref(), &states);
    Ok(0)
}
