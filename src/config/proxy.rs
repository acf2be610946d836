// ABOUTME: Reverse-proxy admin API settings used for traffic cutover.
// ABOUTME: Defaults target a Caddy admin endpoint on localhost.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_admin_url")]
    pub admin_url: String,

    /// Config path of the upstream list for the service's route.
    #[serde(default = "default_upstream_path")]
    pub upstream_path: String,

    /// Host used in the dial target; defaults to the slots' host.
    #[serde(default)]
    pub upstream_host: Option<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            admin_url: default_admin_url(),
            upstream_path: default_upstream_path(),
            upstream_host: None,
            timeout: default_timeout(),
        }
    }
}

fn default_admin_url() -> String {
    "http://127.0.0.1:2019".to_string()
}

fn default_upstream_path() -> String {
    "/config/apps/http/servers/srv0/routes/0/handle/0/upstreams".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}
