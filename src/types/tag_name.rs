// ABOUTME: Release tag names backed by semantic versions.
// ABOUTME: Accepts `v1.2.3`, `1.2.3` and pre-release forms such as `v1.3.0-rc.1`.

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagNameError {
    #[error("release tag cannot be empty")]
    Empty,

    #[error("release tag '{tag}' is not a semantic version: {source}")]
    NotSemver {
        tag: String,
        #[source]
        source: semver::Error,
    },
}

/// A release tag: the literal tag text plus its parsed semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagName {
    raw: String,
    version: Version,
}

impl TagName {
    pub fn parse(input: &str) -> Result<Self, TagNameError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(TagNameError::Empty);
        }

        let numeric = raw.strip_prefix('v').unwrap_or(raw);
        let version = Version::parse(numeric).map_err(|source| TagNameError::NotSemver {
            tag: raw.to_string(),
            source,
        })?;

        Ok(Self {
            raw: raw.to_string(),
            version,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Pre-release qualifier (`rc.1` in `v1.3.0-rc.1`), if any.
    pub fn pre_release(&self) -> Option<&str> {
        if self.version.pre.is_empty() {
            None
        } else {
            Some(self.version.pre.as_str())
        }
    }
}

impl FromStr for TagName {
    type Err = TagNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagName::parse(s)
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for TagName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TagName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TagName::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_v_prefix_in_display() {
        let tag = TagName::parse("v1.2.3").unwrap();
        assert_eq!(tag.to_string(), "v1.2.3");
        assert_eq!(tag.version(), &Version::new(1, 2, 3));
        assert!(tag.pre_release().is_none());
    }

    #[test]
    fn exposes_pre_release_qualifier() {
        let tag = TagName::parse("v1.3.0-rc.1").unwrap();
        assert_eq!(tag.pre_release(), Some("rc.1"));
    }

    #[test]
    fn rejects_non_semver() {
        assert!(matches!(
            TagName::parse("release-42"),
            Err(TagNameError::NotSemver { .. })
        ));
        assert!(matches!(TagName::parse("  "), Err(TagNameError::Empty)));
    }
}
