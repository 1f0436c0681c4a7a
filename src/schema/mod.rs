//! Schema model
//!
//! A canonical, language-agnostic tree describing the shape of a data type.
//! Nodes are plain values: once built they are only compared and traversed.
//!
//! Named types (records, enums, fixed) may be referenced by name from
//! elsewhere in the same set through [`SchemaNode::Ref`], which is how
//! recursive and shared types are expressed.

mod names;
mod validate;

pub use names::NamedTypes;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaModelError;

/// Metadata key carrying a value-level constraint tag (e.g. `non-empty`)
pub const METADATA_CONSTRAINT: &str = "constraint";
/// Metadata key overriding the compatibility mode for one type
pub const METADATA_MODE: &str = "compatibility.mode";
/// Metadata key opting a type in or out of checking (`true` / `false`)
pub const METADATA_CHECKED: &str = "compatibility.checked";

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Bytes,
    String,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Null,
        PrimitiveKind::Boolean,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
        PrimitiveKind::Bytes,
        PrimitiveKind::String,
    ];

    /// The keyword used for this kind in schema text
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Null => "null",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Float32 => "float32",
            PrimitiveKind::Float64 => "float64",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::String => "string",
        }
    }

    /// Look up a kind by its keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == keyword)
    }

    /// Position on the numeric widening path, if any
    pub(crate) fn numeric_rank(&self) -> Option<u8> {
        match self {
            PrimitiveKind::Int32 => Some(0),
            PrimitiveKind::Int64 => Some(1),
            PrimitiveKind::Float32 => Some(2),
            PrimitiveKind::Float64 => Some(3),
            _ => None,
        }
    }

    /// Whether data written as `writer` can be read as `self`
    ///
    /// Numeric kinds widen along int32 → int64 → float32 → float64;
    /// string and bytes promote to each other.
    pub fn can_read(&self, writer: PrimitiveKind) -> bool {
        if *self == writer {
            return true;
        }
        match (self.numeric_rank(), writer.numeric_rank()) {
            (Some(reader_rank), Some(writer_rank)) => writer_rank < reader_rank,
            _ => matches!(
                (self, writer),
                (PrimitiveKind::String, PrimitiveKind::Bytes)
                    | (PrimitiveKind::Bytes, PrimitiveKind::String)
            ),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub node: SchemaNode,
    /// Value used by a reader when the writer does not supply the field.
    /// `Some(Value::Null)` is a real default, distinct from `None`.
    pub default: Option<serde_json::Value>,
    /// Declaration index within the record
    pub position: u32,
}

impl Field {
    /// A field with no default. Position is assigned when added to a record.
    pub fn new(name: impl Into<String>, node: SchemaNode) -> Self {
        Self {
            name: name.into(),
            node,
            default: None,
            position: 0,
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A named record with ordered fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, assigning its position
    pub fn with_field(mut self, mut field: Field) -> Self {
        field.position = self.fields.len() as u32;
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A named enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema {
    pub name: String,
    /// Ordered, unique. Order only matters for default-index fallback.
    pub symbols: Vec<String>,
    pub default_symbol: Option<String>,
}

impl EnumSchema {
    pub fn new<I, S>(name: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
            default_symbol: None,
        }
    }

    pub fn with_default_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.default_symbol = Some(symbol.into());
        self
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}

/// A named fixed-size byte sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSchema {
    pub name: String,
    pub size: u64,
}

impl FixedSchema {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// One node of a schema tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    Primitive(PrimitiveKind),
    /// A primitive carrying semantic meaning, e.g. a `uuid` string
    Logical { base: PrimitiveKind, tag: String },
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(Box<SchemaNode>),
    /// Keys are always strings
    Map(Box<SchemaNode>),
    Union(Vec<SchemaNode>),
    Fixed(FixedSchema),
    /// Reference to a named record, enum or fixed defined in the same set
    Ref(String),
}

/// What distinguishes one union branch from another
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Discriminant<'a> {
    Primitive(PrimitiveKind),
    Logical(PrimitiveKind, &'a str),
    Named(&'a str),
    Array,
    Map,
    Union,
}

impl fmt::Display for Discriminant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discriminant::Primitive(kind) => write!(f, "{}", kind),
            Discriminant::Logical(base, tag) => write!(f, "{}<{}>", base, tag),
            Discriminant::Named(name) => write!(f, "{}", name),
            Discriminant::Array => f.write_str("array"),
            Discriminant::Map => f.write_str("map"),
            Discriminant::Union => f.write_str("union"),
        }
    }
}

impl SchemaNode {
    pub fn null() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Null)
    }

    pub fn boolean() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Boolean)
    }

    pub fn int32() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Int32)
    }

    pub fn int64() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Int64)
    }

    pub fn float32() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Float32)
    }

    pub fn float64() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Float64)
    }

    pub fn bytes() -> Self {
        SchemaNode::Primitive(PrimitiveKind::Bytes)
    }

    pub fn string() -> Self {
        SchemaNode::Primitive(PrimitiveKind::String)
    }

    pub fn logical(base: PrimitiveKind, tag: impl Into<String>) -> Self {
        SchemaNode::Logical {
            base,
            tag: tag.into(),
        }
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array(Box::new(items))
    }

    pub fn map(values: SchemaNode) -> Self {
        SchemaNode::Map(Box::new(values))
    }

    pub fn union(branches: impl IntoIterator<Item = SchemaNode>) -> Self {
        SchemaNode::Union(branches.into_iter().collect())
    }

    /// `[null, node]`, the usual optional shape
    pub fn optional(node: SchemaNode) -> Self {
        SchemaNode::Union(vec![SchemaNode::null(), node])
    }

    pub fn reference(name: impl Into<String>) -> Self {
        SchemaNode::Ref(name.into())
    }

    /// Branch discriminant; references share the identity of their target
    pub fn discriminant(&self) -> Discriminant<'_> {
        match self {
            SchemaNode::Primitive(kind) => Discriminant::Primitive(*kind),
            SchemaNode::Logical { base, tag } => Discriminant::Logical(*base, tag),
            SchemaNode::Record(r) => Discriminant::Named(&r.name),
            SchemaNode::Enum(e) => Discriminant::Named(&e.name),
            SchemaNode::Fixed(f) => Discriminant::Named(&f.name),
            SchemaNode::Ref(name) => Discriminant::Named(name),
            SchemaNode::Array(_) => Discriminant::Array,
            SchemaNode::Map(_) => Discriminant::Map,
            SchemaNode::Union(_) => Discriminant::Union,
        }
    }

    /// Name of a named type definition or reference
    pub fn name(&self) -> Option<&str> {
        match self {
            SchemaNode::Record(r) => Some(&r.name),
            SchemaNode::Enum(e) => Some(&e.name),
            SchemaNode::Fixed(f) => Some(&f.name),
            SchemaNode::Ref(name) => Some(name),
            _ => None,
        }
    }

    /// Short label for the node's kind, used in issue messages
    pub fn kind_label(&self) -> String {
        match self {
            SchemaNode::Primitive(kind) => kind.to_string(),
            SchemaNode::Logical { base, tag } => format!("{}<{}>", base, tag),
            SchemaNode::Record(r) => format!("record {}", r.name),
            SchemaNode::Enum(e) => format!("enum {}", e.name),
            SchemaNode::Fixed(f) => format!("fixed {}({})", f.name, f.size),
            SchemaNode::Ref(name) => format!("ref {}", name),
            SchemaNode::Array(_) => "array".to_string(),
            SchemaNode::Map(_) => "map".to_string(),
            SchemaNode::Union(branches) => format!("union of {}", branches.len()),
        }
    }

    /// Check the structural invariants of this tree in isolation.
    ///
    /// References must resolve to named types defined inside the tree.
    pub fn validate(&self) -> Result<(), SchemaModelError> {
        let mut named = NamedTypes::default();
        named.define_all(self)?;
        validate::validate_tree(self, &named)
    }
}

impl From<PrimitiveKind> for SchemaNode {
    fn from(kind: PrimitiveKind) -> Self {
        SchemaNode::Primitive(kind)
    }
}

impl From<RecordSchema> for SchemaNode {
    fn from(record: RecordSchema) -> Self {
        SchemaNode::Record(record)
    }
}

impl From<EnumSchema> for SchemaNode {
    fn from(e: EnumSchema) -> Self {
        SchemaNode::Enum(e)
    }
}

impl From<FixedSchema> for SchemaNode {
    fn from(f: FixedSchema) -> Self {
        SchemaNode::Fixed(f)
    }
}

/// One type's schema as produced by one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion {
    /// Stable identity used to match a type across versions
    pub type_name: String,
    pub node: SchemaNode,
    /// Auxiliary declarations (mode override, constraint tag, ...)
    pub metadata: BTreeMap<String, String>,
}

impl SchemaVersion {
    pub fn new(type_name: impl Into<String>, node: impl Into<SchemaNode>) -> Self {
        Self {
            type_name: type_name.into(),
            node: node.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Value-level constraint tag, if declared
    pub fn constraint(&self) -> Option<&str> {
        self.metadata.get(METADATA_CONSTRAINT).map(String::as_str)
    }
}

/// All schemas produced by one build, keyed by type name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedSchemaSet {
    entries: BTreeMap<String, SchemaVersion>,
}

impl NamedSchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting duplicate type names
    pub fn from_versions(
        versions: impl IntoIterator<Item = SchemaVersion>,
    ) -> Result<Self, SchemaModelError> {
        let mut set = Self::new();
        for version in versions {
            set.insert(version)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, version: SchemaVersion) -> Result<(), SchemaModelError> {
        if self.entries.contains_key(&version.type_name) {
            return Err(SchemaModelError::DuplicateTypeName(version.type_name));
        }
        self.entries.insert(version.type_name.clone(), version);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&SchemaVersion> {
        self.entries.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names in sorted order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in type-name order
    pub fn iter(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.entries.values()
    }

    pub fn into_versions(self) -> impl Iterator<Item = SchemaVersion> {
        self.entries.into_values()
    }

    /// Named types defined anywhere in the set, first definition wins
    pub fn named_types(&self) -> NamedTypes<'_> {
        let mut named = NamedTypes::default();
        for version in self.iter() {
            named.collect(&version.node);
        }
        named
    }

    /// Check every invariant a storable set must hold: per-node structure,
    /// one shape per named type, resolvable references and no cyclic
    /// direct containment between records.
    pub fn validate(&self) -> Result<(), SchemaModelError> {
        let mut named = NamedTypes::default();
        for version in self.iter() {
            named.define_all(&version.node)?;
        }
        for version in self.iter() {
            validate::validate_tree(&version.node, &named)?;
        }
        named.check_acyclic()
    }
}

impl<'a> IntoIterator for &'a NamedSchemaSet {
    type Item = &'a SchemaVersion;
    type IntoIter = std::collections::btree_map::Values<'a, String, SchemaVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl FromStr for PrimitiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| format!("unknown primitive kind '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> RecordSchema {
        RecordSchema::new("User")
            .with_field(Field::new("id", SchemaNode::int64()))
            .with_field(Field::new("name", SchemaNode::string()))
    }

    #[test]
    fn test_positions_follow_declaration_order() {
        let record = user();
        let positions: Vec<u32> = record.fields.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(record.field("name").map(|f| f.position), Some(1));
    }

    #[test]
    fn test_promotion_path() {
        use PrimitiveKind::*;
        assert!(Int64.can_read(Int32));
        assert!(Float64.can_read(Int32));
        assert!(Float32.can_read(Int64));
        assert!(!Int32.can_read(Int64));
        assert!(String.can_read(Bytes));
        assert!(Bytes.can_read(String));
        assert!(!String.can_read(Int32));
        assert!(!Boolean.can_read(Null));
    }

    #[test]
    fn test_duplicate_type_name_rejected() {
        let mut set = NamedSchemaSet::new();
        set.insert(SchemaVersion::new("User", user())).unwrap();
        let err = set.insert(SchemaVersion::new("User", user())).unwrap_err();
        assert_eq!(err, SchemaModelError::DuplicateTypeName("User".to_string()));
    }

    #[test]
    fn test_ref_shares_discriminant_with_definition() {
        let def = SchemaNode::Record(user());
        let reference = SchemaNode::reference("User");
        assert_eq!(def.discriminant(), reference.discriminant());
    }

    #[test]
    fn test_constraint_metadata() {
        let version = SchemaVersion::new("Email", SchemaNode::string())
            .with_metadata(METADATA_CONSTRAINT, "non-empty");
        assert_eq!(version.constraint(), Some("non-empty"));
    }
}
