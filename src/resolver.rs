//! Baseline selection
//!
//! Given the version being built and the versions already published, pick
//! which published versions to compare against.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::version::ArtifactVersion;

/// How baselines are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Greatest earlier patch in the same `major.minor` line
    #[default]
    LatestMinor,
    /// Greatest other patch in the same `major.minor` line
    LatestPatch,
    /// Greatest version of the previous major
    PreviousMajor,
    /// Every earlier version, newest first
    All,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::LatestMinor => write!(f, "latest_minor"),
            Strategy::LatestPatch => write!(f, "latest_patch"),
            Strategy::PreviousMajor => write!(f, "previous_major"),
            Strategy::All => write!(f, "all"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "latest_minor" => Ok(Strategy::LatestMinor),
            "latest_patch" => Ok(Strategy::LatestPatch),
            "previous_major" => Ok(Strategy::PreviousMajor),
            "all" => Ok(Strategy::All),
            other => Err(format!("unknown baseline strategy '{}'", other)),
        }
    }
}

/// Select baselines for `current` from `known`.
///
/// Prerelease versions are only candidates when `include_prereleases` is
/// set or the strategy is [`Strategy::All`]. The result is sorted newest
/// first and holds at most one version for every strategy except `All`.
pub fn resolve(
    current: &ArtifactVersion,
    known: &[ArtifactVersion],
    strategy: Strategy,
    include_prereleases: bool,
) -> Vec<ArtifactVersion> {
    let allow_prerelease = include_prereleases || strategy == Strategy::All;
    let candidates: BTreeSet<&ArtifactVersion> = known
        .iter()
        .filter(|v| allow_prerelease || !v.is_prerelease())
        .collect();

    match strategy {
        Strategy::LatestMinor => greatest(&candidates, |v| v.same_line(current) && v.patch() < current.patch()),
        Strategy::LatestPatch => greatest(&candidates, |v| v.same_line(current) && v.patch() != current.patch()),
        Strategy::PreviousMajor => match current.major().checked_sub(1) {
            Some(previous) => greatest(&candidates, |v| v.major() == previous),
            None => Vec::new(),
        },
        Strategy::All => candidates
            .iter()
            .rev()
            .filter(|v| **v < current)
            .map(|v| (*v).clone())
            .collect(),
    }
}

fn greatest(
    candidates: &BTreeSet<&ArtifactVersion>,
    keep: impl Fn(&ArtifactVersion) -> bool,
) -> Vec<ArtifactVersion> {
    candidates
        .iter()
        .rev()
        .find(|v| keep(**v))
        .map(|v| (*v).clone())
        .into_iter()
        .collect()
}

/// String-level entry point. Unparsable known versions are skipped; an
/// unparsable `current` selects nothing.
pub fn resolve_baselines<S: AsRef<str>>(current: &str, known: &[S], strategy: Strategy) -> Vec<ArtifactVersion> {
    resolve_baselines_with(current, known, strategy, false)
}

pub fn resolve_baselines_with<S: AsRef<str>>(
    current: &str,
    known: &[S],
    strategy: Strategy,
    include_prereleases: bool,
) -> Vec<ArtifactVersion> {
    let current = match ArtifactVersion::parse(current) {
        Ok(version) => version,
        Err(e) => {
            debug!(error = %e, "Current version is unparsable, no baselines selected");
            return Vec::new();
        }
    };

    let known: Vec<ArtifactVersion> = known
        .iter()
        .filter_map(|raw| match ArtifactVersion::parse(raw.as_ref()) {
            Ok(version) => Some(version),
            Err(e) => {
                debug!(error = %e, "Skipping unparsable known version");
                None
            }
        })
        .collect();

    let selected = resolve(&current, &known, strategy, include_prereleases);
    debug!(
        current = %current,
        strategy = %strategy,
        known = known.len(),
        selected = selected.len(),
        "Resolved baselines"
    );
    selected
}
