//! Schema Evolution
//!
//! Detects breaking changes between versions of a data-type schema before
//! they are published.
//!
//! ## Features
//!
//! - **Canonical Schema Model**: records, enums, unions, arrays, maps, fixed
//!   and logical types as one tree, independent of the source language
//! - **Compatibility Checking**: backward, forward and full checks with
//!   path-addressed issues
//! - **Artifact Storage**: schema sets encoded into flat string attributes
//!   that travel with build artifacts
//! - **Baseline Resolution**: choose which published versions to compare
//!   against
//! - **Build Registry**: thread-safe collection of the schemas a build emits
//!
//! ## Flow
//!
//! ```text
//! build ──register──▶ SchemaRegistry ──drain──▶ NamedSchemaSet ──encode_set──▶ attributes
//!                                                    │
//! published attributes ──decode_set──▶ baseline ─────┴──check_sets──▶ Vec<Issue>
//! ```
//!
//! ## Example
//!
//! ```
//! use schema_evolution::{check, Field, IssueKind, Mode, RecordSchema, SchemaNode};
//!
//! let old: SchemaNode = RecordSchema::new("User")
//!     .with_field(Field::new("id", SchemaNode::int64()))
//!     .into();
//! let new: SchemaNode = RecordSchema::new("User")
//!     .with_field(Field::new("id", SchemaNode::int64()))
//!     .with_field(Field::new("email", SchemaNode::string()))
//!     .into();
//!
//! let issues = check(&new, &old, Mode::Backward);
//! assert_eq!(issues[0].kind, IssueKind::MissingDefaultValue);
//! assert_eq!(issues[0].path, "/fields/email");
//! ```

pub mod checksum;
pub mod codec;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod version;

pub use checksum::Checksum;
pub use codec::{decode_set, decode_set_or_empty, encode_set, Attributes, SetCodec};
pub use compatibility::{
    check, check_directional, check_sets, CompatibilityChecker, CompatibilityReport, Direction,
    FailurePolicy, Issue, IssueKind, Mode, Severity, TypeCheckConfig,
};
pub use config::EvolutionConfig;
pub use error::{
    CompatibilityViolation, DecodeError, Result, SchemaError, SchemaModelError, VersionParseError,
};
pub use registry::{SchemaRegistry, SchemaSource};
pub use resolver::{resolve, resolve_baselines, Strategy};
pub use schema::{
    EnumSchema, Field, FixedSchema, NamedSchemaSet, PrimitiveKind, RecordSchema, SchemaNode,
    SchemaVersion,
};
pub use version::ArtifactVersion;
