//! Error types for the schema evolution engine

use thiserror::Error;

use crate::compatibility::Issue;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Malformed schema input. Never silently repaired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaModelError {
    #[error("Duplicate type name in schema set: {0}")]
    DuplicateTypeName(String),

    #[error("Duplicate field '{field}' in record {record}")]
    DuplicateField { record: String, field: String },

    #[error("Field '{field}' in record {record} has position {position}, expected {expected}")]
    FieldPosition {
        record: String,
        field: String,
        position: u32,
        expected: u32,
    },

    #[error("Empty union")]
    EmptyUnion,

    #[error("Union branches are not distinguishable: {0} appears more than once")]
    AmbiguousUnion(String),

    #[error("Union directly contains another union")]
    NestedUnion,

    #[error("Enum {0} has no symbols")]
    EmptyEnum(String),

    #[error("Enum {name} declares symbol '{symbol}' more than once")]
    DuplicateSymbol { name: String, symbol: String },

    #[error("Enum {name} default symbol '{symbol}' is not one of its symbols")]
    UnknownDefaultSymbol { name: String, symbol: String },

    #[error("Named type has an empty name")]
    EmptyName,

    #[error("Named type uses reserved name '{0}'")]
    ReservedName(String),

    #[error("Named type {0} is defined more than once with different shapes")]
    ConflictingDefinition(String),

    #[error("Unresolved reference to named type {0}")]
    UnresolvedReference(String),

    #[error("Cyclic record reference: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    #[error("Empty logical type tag on {0}")]
    EmptyLogicalTag(String),
}

/// Unparsable storage attributes. Callers degrade to "no schemas".
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Missing count attribute '{0}'")]
    MissingCount(String),

    #[error("Count attribute '{key}' is not a number: {value}")]
    InvalidCount { key: String, value: String },

    #[error("Missing schema entry attribute '{0}'")]
    MissingEntry(String),

    #[error("Entry '{key}' is not valid base64: {source}")]
    Base64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("Entry '{key}' is not valid UTF-8")]
    Utf8 { key: String },

    #[error("Entry '{key}' is not a valid schema record: {source}")]
    Entry {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema text: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid schema at {path}: {message}")]
    Node { path: String, message: String },

    #[error("Checksum mismatch for {type_name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        type_name: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Model(#[from] SchemaModelError),
}

impl DecodeError {
    pub(crate) fn node(path: impl Into<String>, message: impl Into<String>) -> Self {
        DecodeError::Node {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A version string outside the `MAJOR.MINOR.PATCH(-TAG)?` grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version '{input}': {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: String,
}

/// One or more `Error`-severity issues, raised only when a caller's policy asks for it
#[derive(Error, Debug, Clone)]
#[error("Compatibility check failed: {errors} error(s), {warnings} warning(s)")]
pub struct CompatibilityViolation {
    pub errors: usize,
    pub warnings: usize,
    pub issues: Vec<Issue>,
}

/// Crate-level errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error(transparent)]
    Model(#[from] SchemaModelError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Version(#[from] VersionParseError),

    #[error(transparent)]
    Incompatible(#[from] CompatibilityViolation),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}
