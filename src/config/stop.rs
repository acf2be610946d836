// ABOUTME: How drained and replaced containers are asked to shut down.
// ABOUTME: Signal name is checked at load time; the timeout bounds the wait before a kill.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct StopConfig {
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub signal: StopSignal,
}

impl Default for StopConfig {
    fn default() -> Self {
        StopConfig {
            timeout: default_timeout(),
            signal: StopSignal::default(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Signal name as the runtime expects it, e.g. `SIGTERM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSignal(String);

impl StopSignal {
    pub fn parse(value: &str) -> Result<Self, String> {
        let name = value.trim().to_ascii_uppercase();
        let name = if name.starts_with("SIG") {
            name
        } else {
            format!("SIG{name}")
        };
        let suffix = &name[3..];
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid stop signal: {value:?}"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self("SIGTERM".to_string())
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for StopSignal {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'de> Deserialize<'de> for StopSignal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        StopSignal::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_get_the_sig_prefix() {
        assert_eq!(StopSignal::parse("quit").unwrap(), "SIGQUIT");
        assert_eq!(StopSignal::parse("SIGINT").unwrap(), "SIGINT");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(StopSignal::parse("SIG").is_err());
        assert!(StopSignal::parse("kill -9").is_err());
    }
}
