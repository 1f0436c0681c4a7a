//! Artifact versions

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::VersionParseError;

fn grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$")
            .unwrap_or_else(|e| unreachable!("version grammar is a valid regex: {}", e))
    })
}

/// A published artifact version: `MAJOR.MINOR.PATCH` with an optional
/// prerelease tag. Build metadata is not accepted.
///
/// Ordering is major, minor, patch, then a release above any of its
/// prereleases, prereleases compared as plain strings (`alpha.10` sorts
/// before `alpha.2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactVersion {
    version: Version,
}

impl ArtifactVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
        }
    }

    /// Parse a version string against the strict grammar
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        if !grammar().is_match(input) {
            return Err(VersionParseError {
                input: input.to_string(),
                reason: "expected MAJOR.MINOR.PATCH with an optional -TAG".to_string(),
            });
        }

        let version = Version::parse(input).map_err(|e| VersionParseError {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { version })
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    pub fn prerelease(&self) -> Option<&str> {
        if self.version.pre.is_empty() {
            None
        } else {
            Some(self.version.pre.as_str())
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Same major and minor
    pub fn same_line(&self, other: &ArtifactVersion) -> bool {
        self.major() == other.major() && self.minor() == other.minor()
    }

    pub fn as_semver(&self) -> &Version {
        &self.version
    }
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major(), self.minor(), self.patch())
            .cmp(&(other.major(), other.minor(), other.patch()))
            .then_with(|| match (self.prerelease(), other.prerelease()) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(ours), Some(theirs)) => ours.cmp(theirs),
            })
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

impl FromStr for ArtifactVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArtifactVersion> for String {
    fn from(value: ArtifactVersion) -> Self {
        value.to_string()
    }
}
