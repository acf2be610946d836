// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a commented releasegate.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{ImageRef, ServiceName};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(
    dir: &Path,
    service: Option<&str>,
    image: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template()?;

    if let Some(s) = service {
        config.service = ServiceName::new(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    if let Some(i) = image {
        config.image = ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"service: {service}
image: {image}
environment: {environment}

slots:
  container_port: {container_port}
  blue: {blue}
  green: {green}

healthcheck:
  path: /health
  interval: 2s
  retries: 5
  start_period: 10s
  deadline: 60s

# api_spec:
#   path: /openapi.json
#   min_routes: 1

validation:
  runtimes: []
  #  - name: python
  #    command: python3
  #    allowed: ">=3.11, <3.13"
  # dependency_check: ["pip", "check"]

build:
  sources: []
  # check: ["python3", "-m", "py_compile"]
  # command: ["docker", "build", "-t", "{{image}}", "--label", "commit={{commit}}", "."]

smoke:
  commands: []
  checks:
    - name: root
      path: /
      expect_status: 200

proxy:
  admin_url: http://127.0.0.1:2019

cleanup:
  grace_period: 30s
"#,
        service = config.service,
        image = config.image,
        environment = config.environment,
        container_port = config.slots.container_port,
        blue = config.slots.blue,
        green = config.slots.green,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trips_through_the_parser() {
        let yaml = generate_template_yaml(&Config::template().unwrap());
        let parsed = Config::from_yaml(&yaml).expect("template should parse");
        assert_eq!(parsed.service.as_str(), "my-app");
        assert_eq!(parsed.slots.green, 8002);
        assert_eq!(parsed.smoke.checks.len(), 1);
    }
}
