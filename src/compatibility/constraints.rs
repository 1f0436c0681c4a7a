//! Value-constraint drift
//!
//! Types may declare a value-level constraint tag in their metadata
//! (`constraint = "non-empty"`). When the tag changes between versions the
//! new constraint may reject values the old one accepted.
//!
//! **This is a heuristic, not a proof.** Both constraints are evaluated
//! against a small fixed sample of strings and numbers. A sample accepted
//! by the old constraint and rejected by the new one proves narrowing; the
//! absence of such a sample proves nothing, since real inputs outside the
//! sample may still be rejected. Pattern constraints in particular are
//! regexes, and regex containment is not decided here.
//!
//! Recognised tags:
//!
//! | Tag | Applies to | Accepts |
//! |-----|------------|---------|
//! | `non-empty` | text | at least one character |
//! | `min-length:N` / `max-length:N` | text | character count bound |
//! | `pattern:REGEX` | text | `REGEX` matches |
//! | `positive` / `non-negative` / `negative` | numbers | sign rule |
//! | `min:N` / `max:N` | numbers | inclusive bound |

use regex::Regex;

const TEXT_SAMPLES: &[&str] = &[
    "",
    " ",
    "a",
    "Z",
    "abc",
    "hello world",
    "0",
    "42",
    "-1",
    "3.14",
    "user@example.com",
    "2024-01-31",
    "ABC-123",
    "a_b-c.d",
    "ünïcödé",
    "https://example.com/path?q=1",
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
];

const NUMBER_SAMPLES: &[f64] = &[
    -1_000_000.0,
    -100.0,
    -1.5,
    -1.0,
    -0.5,
    0.0,
    0.5,
    1.0,
    2.0,
    10.0,
    100.0,
    255.0,
    1_000_000.0,
];

/// A parsed constraint tag
#[derive(Debug, Clone)]
pub enum Constraint {
    NonEmpty,
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    Positive,
    NonNegative,
    Negative,
    Min(f64),
    Max(f64),
}

enum Sample {
    Text(&'static str),
    Number(f64),
}

impl Sample {
    fn describe(&self) -> String {
        match self {
            Sample::Text(text) => format!("{:?}", text),
            Sample::Number(n) => n.to_string(),
        }
    }
}

impl Constraint {
    /// Parse a tag; `None` for anything unrecognised
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if let Some(pattern) = tag.strip_prefix("pattern:") {
            return Regex::new(pattern).ok().map(Constraint::Pattern);
        }
        if let Some((name, arg)) = tag.split_once(':') {
            let arg = arg.trim();
            return match name.trim() {
                "min-length" => arg.parse().ok().map(Constraint::MinLength),
                "max-length" => arg.parse().ok().map(Constraint::MaxLength),
                "min" => arg.parse().ok().map(Constraint::Min),
                "max" => arg.parse().ok().map(Constraint::Max),
                _ => None,
            };
        }
        match tag {
            "non-empty" => Some(Constraint::NonEmpty),
            "positive" => Some(Constraint::Positive),
            "non-negative" => Some(Constraint::NonNegative),
            "negative" => Some(Constraint::Negative),
            _ => None,
        }
    }

    /// `None` when the constraint does not apply to this kind of value
    fn accepts(&self, sample: &Sample) -> Option<bool> {
        match (self, sample) {
            (Constraint::NonEmpty, Sample::Text(t)) => Some(!t.is_empty()),
            (Constraint::MinLength(n), Sample::Text(t)) => Some(t.chars().count() >= *n),
            (Constraint::MaxLength(n), Sample::Text(t)) => Some(t.chars().count() <= *n),
            (Constraint::Pattern(re), Sample::Text(t)) => Some(re.is_match(t)),
            (Constraint::Positive, Sample::Number(n)) => Some(*n > 0.0),
            (Constraint::NonNegative, Sample::Number(n)) => Some(*n >= 0.0),
            (Constraint::Negative, Sample::Number(n)) => Some(*n < 0.0),
            (Constraint::Min(min), Sample::Number(n)) => Some(n >= min),
            (Constraint::Max(max), Sample::Number(n)) => Some(n <= max),
            _ => None,
        }
    }
}

/// Outcome of comparing an old constraint with a new one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintVerdict {
    /// A sample value satisfies the old constraint but not the new one
    Narrowed { counterexample: String },
    /// Every applicable sample accepted before is still accepted
    NoCounterexample,
    /// A tag is unrecognised or the constraints apply to different values
    Undetermined,
}

/// Compare constraint tags on the fixed sample. See the module docs for
/// why a verdict other than `Narrowed` is not a guarantee.
pub fn compare(old: &str, new: &str) -> ConstraintVerdict {
    let (Some(old), Some(new)) = (Constraint::parse(old), Constraint::parse(new)) else {
        return ConstraintVerdict::Undetermined;
    };

    let samples = TEXT_SAMPLES
        .iter()
        .map(|t| Sample::Text(t))
        .chain(NUMBER_SAMPLES.iter().map(|n| Sample::Number(*n)));

    let mut comparable = false;
    for sample in samples {
        match (old.accepts(&sample), new.accepts(&sample)) {
            (Some(true), Some(false)) => {
                return ConstraintVerdict::Narrowed {
                    counterexample: sample.describe(),
                }
            }
            (Some(_), Some(_)) => comparable = true,
            _ => {}
        }
    }

    if comparable {
        ConstraintVerdict::NoCounterexample
    } else {
        ConstraintVerdict::Undetermined
    }
}
