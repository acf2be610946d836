// ABOUTME: Validated version-control commit hashes.
// ABOUTME: Normalised to lowercase hex so comparisons across tools are exact.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommitHashError {
    #[error("commit hash must be 7 to 64 characters, got {0}")]
    BadLength(usize),

    #[error("commit hash contains non-hex character '{0}'")]
    NotHex(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(value: &str) -> Result<Self, CommitHashError> {
        let value = value.trim();
        if !(7..=64).contains(&value.len()) {
            return Err(CommitHashError::BadLength(value.len()));
        }
        if let Some(c) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CommitHashError::NotHex(c));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }

    /// Whether two hashes name the same commit, allowing either to be abbreviated.
    pub fn matches(&self, other: &CommitHash) -> bool {
        self.0.starts_with(&other.0) || other.0.starts_with(&self.0)
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CommitHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CommitHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CommitHash::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_case() {
        let c = CommitHash::new("ABCDEF1").unwrap();
        assert_eq!(c.as_str(), "abcdef1");
    }

    #[test]
    fn abbreviated_hash_matches_full() {
        let full = CommitHash::new("abcdef1234567890abcdef1234567890abcdef12").unwrap();
        let short = CommitHash::new("abcdef12").unwrap();
        assert!(full.matches(&short));
        assert!(short.matches(&full));
        assert!(!full.matches(&CommitHash::new("1234567").unwrap()));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            CommitHash::new("abc"),
            Err(CommitHashError::BadLength(3))
        ));
        assert!(matches!(
            CommitHash::new("zzzzzzzz"),
            Err(CommitHashError::NotHex('z'))
        ));
    }
}
