//! Schema compatibility checking
//!
//! Compares a reader schema against a writer schema and reports every
//! structural difference as a path-addressed [`Issue`].
//!
//! | Mode | Reader | Writer | Question |
//! |------|--------|--------|----------|
//! | `Backward` | new | old | can new code read old data? |
//! | `Forward` | old | new | can old code read new data? |
//! | `Full` | both | both | both of the above |
//!
//! The engine only reports. Whether an `Error` fails a build is decided by
//! the caller through [`CompatibilityReport::enforce`].

pub(crate) mod checker;
pub mod constraints;
mod rules;

pub use checker::{check_sets, CompatibilityChecker, TypeCheckConfig};
pub use constraints::{Constraint, ConstraintVerdict};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompatibilityViolation;
use crate::schema::{NamedTypes, SchemaNode};
use rules::Comparator;

/// Which compatibility guarantee to check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// New readers can read data from old writers
    #[default]
    Backward,
    /// Old readers can read data from new writers
    Forward,
    /// Both directions
    Full,
}

impl Mode {
    pub fn directions(&self) -> &'static [Direction] {
        match self {
            Mode::Backward => &[Direction::Backward],
            Mode::Forward => &[Direction::Forward],
            Mode::Full => &[Direction::Backward, Direction::Forward],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Backward => write!(f, "backward"),
            Mode::Forward => write!(f, "forward"),
            Mode::Full => write!(f, "full"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backward" => Ok(Mode::Backward),
            "forward" => Ok(Mode::Forward),
            "full" => Ok(Mode::Full),
            other => Err(format!("unknown compatibility mode '{}'", other)),
        }
    }
}

/// One direction of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// reader = current, writer = previous
    Backward,
    /// reader = previous, writer = current
    Forward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Backward => write!(f, "backward"),
            Direction::Forward => write!(f, "forward"),
        }
    }
}

/// Issue severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.pad("INFO"),
            Severity::Warning => f.pad("WARNING"),
            Severity::Error => f.pad("ERROR"),
        }
    }
}

/// Closed taxonomy of reported differences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    TypeMismatch,
    MissingDefaultValue,
    FieldRemoved,
    FieldAdded,
    EnumSymbolMissing,
    UnionBranchMissing,
    SizeMismatch,
    ConstraintTightened,
    SchemaAdded,
    SchemaRemoved,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single reported difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Set by set-level checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Slash-delimited structural locator, `/` for the root
    pub path: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            type_name: None,
            path: if path.is_empty() { "/".to_string() } else { path },
            kind,
            severity,
            message: message.into(),
            direction: None,
        }
    }

    pub fn error(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, path, message)
    }

    pub fn warning(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, path, message)
    }

    pub fn info(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Info, path, message)
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<7} ", self.severity)?;
        if let Some(type_name) = &self.type_name {
            write!(f, "{} ", type_name)?;
        }
        write!(f, "{} {}: {}", self.path, self.kind, self.message)
    }
}

/// Check `current` against `previous` in the given mode.
///
/// In `Backward` mode `current` is the reader and `previous` the writer;
/// `Forward` swaps the roles; `Full` runs both and prefixes each message
/// with its direction. Named references resolve within each tree.
pub fn check(current: &SchemaNode, previous: &SchemaNode, mode: Mode) -> Vec<Issue> {
    let current_types = NamedTypes::from_node(current);
    let previous_types = NamedTypes::from_node(previous);
    check_with_types(current, &current_types, previous, &previous_types, mode)
}

pub(crate) fn check_with_types<'a>(
    current: &'a SchemaNode,
    current_types: &'a NamedTypes<'a>,
    previous: &'a SchemaNode,
    previous_types: &'a NamedTypes<'a>,
    mode: Mode,
) -> Vec<Issue> {
    let mut issues = Vec::new();
    for direction in mode.directions() {
        let found = match direction {
            Direction::Backward => {
                Comparator::new(current_types, previous_types).run(current, previous)
            }
            Direction::Forward => {
                Comparator::new(previous_types, current_types).run(previous, current)
            }
        };
        issues.extend(found.into_iter().map(|mut issue| {
            issue.direction = Some(*direction);
            if mode == Mode::Full {
                issue.message = format!("[{}] {}", direction, issue.message);
            }
            issue
        }));
    }
    issues
}

/// One-directional check: can `reader` decode data produced with `writer`?
pub fn check_directional(reader: &SchemaNode, writer: &SchemaNode) -> Vec<Issue> {
    let reader_types = NamedTypes::from_node(reader);
    let writer_types = NamedTypes::from_node(writer);
    Comparator::new(&reader_types, &writer_types).run(reader, writer)
}

/// When a report should fail the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Fail on any `Error` issue
    pub fail_on_breaking: bool,
    /// Also fail on `Warning` issues
    pub fail_on_warnings: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fail_on_breaking: true,
            fail_on_warnings: false,
        }
    }
}

/// Issues from one comparison run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub issues: Vec<Issue>,
}

impl CompatibilityReport {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// No `Error` issues
    pub fn is_compatible(&self) -> bool {
        self.errors() == 0
    }

    pub fn issues_for<'r>(&'r self, type_name: &'r str) -> impl Iterator<Item = &'r Issue> + 'r {
        self.issues
            .iter()
            .filter(move |i| i.type_name.as_deref() == Some(type_name))
    }

    /// Turn the report into a failure if `policy` says so
    pub fn enforce(&self, policy: &FailurePolicy) -> Result<(), CompatibilityViolation> {
        let errors = self.errors();
        let warnings = self.warnings();
        let failed = (policy.fail_on_breaking && errors > 0)
            || (policy.fail_on_warnings && warnings > 0);
        if failed {
            Err(CompatibilityViolation {
                errors,
                warnings,
                issues: self
                    .issues
                    .iter()
                    .filter(|i| i.severity >= Severity::Warning)
                    .cloned()
                    .collect(),
            })
        } else {
            Ok(())
        }
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumSchema, Field, RecordSchema};

    fn user(fields: &[&str]) -> SchemaNode {
        fields
            .iter()
            .fold(RecordSchema::new("User"), |r, name| {
                r.with_field(Field::new(*name, SchemaNode::string()))
            })
            .into()
    }

    #[test]
    fn test_mode_directions() {
        assert_eq!(Mode::Full.directions(), &[Direction::Backward, Direction::Forward]);
        assert_eq!("FULL".parse::<Mode>().unwrap(), Mode::Full);
        assert!("sideways".parse::<Mode>().is_err());
    }

    #[test]
    fn test_backward_and_forward_swap_roles() {
        let old = user(&["id"]);
        let new = user(&["id", "email"]);

        let backward = check(&new, &old, Mode::Backward);
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].kind, IssueKind::MissingDefaultValue);
        assert_eq!(backward[0].direction, Some(Direction::Backward));

        let forward = check(&new, &old, Mode::Forward);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].kind, IssueKind::FieldRemoved);
        assert_eq!(forward[0].severity, Severity::Info);
    }

    #[test]
    fn test_full_mode_tags_direction_in_message() {
        let old = user(&["id"]);
        let new = user(&["id", "email"]);
        let issues = check(&new, &old, Mode::Full);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.starts_with("[backward] "));
        assert!(issues[1].message.starts_with("[forward] "));
    }

    #[test]
    fn test_report_policy() {
        let old: SchemaNode = EnumSchema::new("Status", ["A", "B"]).into();
        let new: SchemaNode = EnumSchema::new("Status", ["A"]).into();
        let report = CompatibilityReport::new(check(&new, &old, Mode::Backward));
        assert!(!report.is_compatible());

        let violation = report.enforce(&FailurePolicy::default()).unwrap_err();
        assert_eq!(violation.errors, 1);

        let lenient = FailurePolicy {
            fail_on_breaking: false,
            fail_on_warnings: false,
        };
        assert!(report.enforce(&lenient).is_ok());
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::error(IssueKind::TypeMismatch, "/fields/id", "reader expects int64")
            .with_type_name("User");
        assert_eq!(
            issue.to_string(),
            "ERROR   User /fields/id TypeMismatch: reader expects int64"
        );
        assert_eq!(Issue::info(IssueKind::SchemaAdded, "", "new").path, "/");
    }
}
