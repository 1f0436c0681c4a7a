use std::collections::BTreeMap;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::constraints::{self, ConstraintVerdict};
use super::{check_with_types, CompatibilityReport, Issue, IssueKind, Mode};
use crate::checksum::Checksum;
use crate::config::EvolutionConfig;
use crate::schema::{NamedSchemaSet, NamedTypes, SchemaVersion, METADATA_CHECKED, METADATA_MODE};

/// Per-type opt-in record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCheckConfig {
    #[serde(default = "default_checked")]
    pub checked: bool,
    /// Overrides the checker's mode for this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

fn default_checked() -> bool {
    true
}

impl Default for TypeCheckConfig {
    fn default() -> Self {
        Self {
            checked: true,
            mode: None,
        }
    }
}

impl TypeCheckConfig {
    pub fn unchecked() -> Self {
        Self {
            checked: false,
            mode: None,
        }
    }

    pub fn with_mode(mode: Mode) -> Self {
        Self {
            checked: true,
            mode: Some(mode),
        }
    }

    /// Read the record from schema metadata. `None` when neither key is set;
    /// unreadable values are ignored with a warning.
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Option<Self> {
        let checked = metadata.get(METADATA_CHECKED);
        let mode = metadata.get(METADATA_MODE);
        if checked.is_none() && mode.is_none() {
            return None;
        }

        let mut config = Self::default();
        if let Some(raw) = checked {
            match raw.trim().parse::<bool>() {
                Ok(value) => config.checked = value,
                Err(_) => warn!(key = METADATA_CHECKED, value = %raw, "Ignoring unreadable metadata"),
            }
        }
        if let Some(raw) = mode {
            match raw.parse::<Mode>() {
                Ok(value) => config.mode = Some(value),
                Err(e) => warn!(key = METADATA_MODE, error = %e, "Ignoring unreadable metadata"),
            }
        }
        Some(config)
    }
}

/// Compares whole schema sets
#[derive(Debug, Clone)]
pub struct CompatibilityChecker {
    mode: Mode,
    overrides: BTreeMap<String, TypeCheckConfig>,
    parallel: bool,
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

/// Exact match first. Keys loaded through the config crate may have been
/// lowercased, so fall back to an ASCII case-insensitive match.
pub(crate) fn lookup<'m>(
    overrides: &'m BTreeMap<String, TypeCheckConfig>,
    type_name: &str,
) -> Option<&'m TypeCheckConfig> {
    overrides.get(type_name).or_else(|| {
        overrides
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(type_name))
            .map(|(_, config)| config)
    })
}

struct Job<'a> {
    type_name: &'a str,
    current: &'a SchemaVersion,
    baseline: &'a SchemaVersion,
    mode: Mode,
}

impl CompatibilityChecker {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            overrides: BTreeMap::new(),
            parallel: false,
        }
    }

    pub fn from_config(config: &EvolutionConfig) -> Self {
        Self {
            mode: config.compatibility.mode,
            overrides: config.types.clone(),
            parallel: config.compatibility.parallel,
        }
    }

    pub fn with_type_config(mut self, type_name: impl Into<String>, config: TypeCheckConfig) -> Self {
        self.overrides.insert(type_name.into(), config);
        self
    }

    /// Fan shared-type comparisons out over worker threads
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Explicit configuration first, then the schema's own metadata
    fn type_config(&self, version: &SchemaVersion) -> TypeCheckConfig {
        lookup(&self.overrides, &version.type_name)
            .copied()
            .or_else(|| TypeCheckConfig::from_metadata(&version.metadata))
            .unwrap_or_default()
    }

    /// Compare `current` against `baseline`.
    ///
    /// Issues come out in a fixed order: shared types by name (structural
    /// issues, then constraint drift), then `SchemaAdded` for new types, then
    /// `SchemaRemoved` for types the current set no longer has.
    ///
    /// An empty baseline means there is nothing to compare against and
    /// yields an empty report.
    pub fn check_sets(&self, current: &NamedSchemaSet, baseline: &NamedSchemaSet) -> CompatibilityReport {
        if baseline.is_empty() {
            debug!(current = current.len(), "No baseline schemas, nothing to compare");
            return CompatibilityReport::default();
        }

        let current_types = current.named_types();
        let baseline_types = baseline.named_types();

        let mut jobs = Vec::new();
        let mut added = Vec::new();
        for version in current {
            let config = self.type_config(version);
            if !config.checked {
                debug!(type_name = %version.type_name, "Skipping unchecked type");
                continue;
            }
            match baseline.get(&version.type_name) {
                Some(previous) => jobs.push(Job {
                    type_name: &version.type_name,
                    current: version,
                    baseline: previous,
                    mode: config.mode.unwrap_or(self.mode),
                }),
                None => added.push(&version.type_name),
            }
        }

        let removed: Vec<&String> = baseline
            .iter()
            .filter(|v| !current.contains(&v.type_name) && self.type_config(v).checked)
            .map(|v| &v.type_name)
            .collect();

        let mut issues = if self.parallel && jobs.len() > 1 {
            run_parallel(&jobs, &current_types, &baseline_types)
        } else {
            jobs.iter()
                .flat_map(|job| run_job(job, &current_types, &baseline_types))
                .collect()
        };

        issues.extend(added.iter().map(|name| {
            Issue::info(IssueKind::SchemaAdded, "/", "type is new in this version").with_type_name(*name)
        }));
        issues.extend(removed.iter().map(|name| {
            Issue::error(
                IssueKind::SchemaRemoved,
                "/",
                "type exists in the baseline but not in this version",
            )
            .with_type_name(*name)
        }));

        let report = CompatibilityReport::new(issues);
        info!(
            mode = %self.mode,
            shared = jobs.len(),
            added = added.len(),
            removed = removed.len(),
            errors = report.errors(),
            warnings = report.warnings(),
            "Compared schema sets"
        );
        report
    }
}

fn run_parallel(jobs: &[Job<'_>], current_types: &NamedTypes<'_>, baseline_types: &NamedTypes<'_>) -> Vec<Issue> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(jobs.len());
    let chunk_size = jobs.len().div_ceil(workers);
    debug!(jobs = jobs.len(), workers, "Checking types in parallel");

    thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .flat_map(|job| run_job(job, current_types, baseline_types))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        // Joined in chunk order, so output matches the sequential path
        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(issues) => issues,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    })
}

fn run_job(job: &Job<'_>, current_types: &NamedTypes<'_>, baseline_types: &NamedTypes<'_>) -> Vec<Issue> {
    // Covers referenced definitions too, so a change to a type reached
    // through a reference still gets this type checked
    if Checksum::of_closure(job.current, current_types) == Checksum::of_closure(job.baseline, baseline_types) {
        debug!(type_name = %job.type_name, "Unchanged");
        return Vec::new();
    }

    let mut issues = check_with_types(
        &job.current.node,
        current_types,
        &job.baseline.node,
        baseline_types,
        job.mode,
    );
    issues.extend(constraint_issue(job.baseline, job.current));
    for issue in &mut issues {
        issue.type_name = Some(job.type_name.to_string());
    }
    debug!(type_name = %job.type_name, issues = issues.len(), "Checked type");
    issues
}

fn constraint_issue(baseline: &SchemaVersion, current: &SchemaVersion) -> Option<Issue> {
    match (baseline.constraint(), current.constraint()) {
        (Some(old), Some(new)) if old != new => Some(match constraints::compare(old, new) {
            ConstraintVerdict::Narrowed { counterexample } => Issue::error(
                IssueKind::ConstraintTightened,
                "/",
                format!(
                    "constraint changed from '{}' to '{}'; {} was accepted and is now rejected",
                    old, new, counterexample
                ),
            ),
            _ => Issue::warning(
                IssueKind::ConstraintTightened,
                "/",
                format!(
                    "constraint changed from '{}' to '{}'; previously valid values may be rejected",
                    old, new
                ),
            ),
        }),
        _ => None,
    }
}

/// Compare two sets in `mode` with default settings
pub fn check_sets(current: &NamedSchemaSet, baseline: &NamedSchemaSet, mode: Mode) -> Vec<Issue> {
    CompatibilityChecker::new(mode)
        .check_sets(current, baseline)
        .into_issues()
}
