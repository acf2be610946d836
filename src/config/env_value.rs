// ABOUTME: Container environment values with host environment interpolation.
// ABOUTME: A value is a scalar literal or a reference to a host variable with a default.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    /// Unquoted YAML numbers, e.g. `WORKERS: 4`.
    Number(serde_yaml::Number),
    Bool(bool),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<String> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::Number(n) => Ok(n.to_string()),
            EnvValue::Bool(b) => Ok(b.to_string()),
            EnvValue::FromEnv { var, default } => lookup(var)
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }
}

pub fn resolve_env_map(map: &HashMap<String, EnvValue>) -> Result<HashMap<String, String>> {
    map.iter()
        .map(|(k, v)| v.resolve().map(|resolved| (k.clone(), resolved)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_stringified() {
        let map: HashMap<String, EnvValue> =
            serde_yaml::from_str("WORKERS: 4\nDEBUG: false\nRATIO: 0.5\nNAME: shop").unwrap();
        assert_eq!(map["WORKERS"].resolve_with(|_| None).unwrap(), "4");
        assert_eq!(map["DEBUG"].resolve_with(|_| None).unwrap(), "false");
        assert_eq!(map["RATIO"].resolve_with(|_| None).unwrap(), "0.5");
        assert_eq!(map["NAME"], EnvValue::Literal("shop".to_string()));
    }

    #[test]
    fn lookup_wins_over_default() {
        let value: EnvValue = serde_yaml::from_str("{env: DB_URL, default: sqlite://}").unwrap();
        let found = value
            .resolve_with(|var| (var == "DB_URL").then(|| "postgres://db".to_string()))
            .unwrap();
        assert_eq!(found, "postgres://db");
        assert_eq!(value.resolve_with(|_| None).unwrap(), "sqlite://");
    }
}
