// ABOUTME: Service topology settings: blue/green slot ports and auxiliary services.
// ABOUTME: Auxiliary services run the same image and are restarted in place.

use serde::Deserialize;
use std::collections::HashMap;

use super::EnvValue;
use crate::types::ServiceName;

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsConfig {
    /// Host the slot ports are published on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the service listens on inside the container.
    pub container_port: u16,

    pub blue: u16,

    pub green: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuxServiceConfig {
    pub name: ServiceName,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    /// Optional services that fail to restart downgrade the gate to a warning.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}
