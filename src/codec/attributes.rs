//! Attribute-map storage format
//!
//! A schema set travels inside build artifacts as a flat string → string
//! map, e.g. manifest attributes of a packaged artifact:
//!
//! ```text
//! schema-evolution.count = 2
//! schema-evolution.0     = base64({"checksum":..,"metadata":{..},"schema":"..","typeName":"Order"})
//! schema-evolution.1     = base64({"checksum":..,"metadata":{..},"schema":"..","typeName":"User"})
//! ```
//!
//! Entries are written in type-name order so encoding is deterministic.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::node::{decode_node, encode_node};
use crate::checksum::Checksum;
use crate::error::{DecodeError, SchemaModelError};
use crate::schema::{NamedSchemaSet, SchemaVersion};

/// Default attribute key prefix
pub const DEFAULT_PREFIX: &str = "schema-evolution";

/// Attribute map carrying an encoded schema set
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    type_name: String,
    schema: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    checksum: Option<Checksum>,
}

/// Encodes and decodes schema sets under one attribute prefix
#[derive(Debug, Clone)]
pub struct SetCodec {
    prefix: String,
}

impl Default for SetCodec {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl SetCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn count_key(&self) -> String {
        format!("{}.count", self.prefix)
    }

    pub fn entry_key(&self, index: usize) -> String {
        format!("{}.{}", self.prefix, index)
    }

    /// Encode a validated set into attributes
    pub fn encode(&self, set: &NamedSchemaSet) -> Result<Attributes, SchemaModelError> {
        set.validate()?;

        let mut attributes = Attributes::new();
        attributes.insert(self.count_key(), set.len().to_string());
        for (index, version) in set.iter().enumerate() {
            let entry = json!({
                "typeName": version.type_name,
                "schema": encode_node(&version.node),
                "metadata": version.metadata,
                "checksum": Checksum::of_version(version),
            });
            attributes.insert(self.entry_key(index), STANDARD.encode(entry.to_string()));
        }

        debug!(prefix = %self.prefix, schemas = set.len(), "Encoded schema set");
        Ok(attributes)
    }

    /// Decode attributes into a set. Any unreadable entry fails the whole set.
    pub fn decode(&self, attributes: &Attributes) -> Result<NamedSchemaSet, DecodeError> {
        let count_key = self.count_key();
        let raw_count = attributes
            .get(&count_key)
            .ok_or_else(|| DecodeError::MissingCount(count_key.clone()))?;
        let count: usize = raw_count.parse().map_err(|_| DecodeError::InvalidCount {
            key: count_key.clone(),
            value: raw_count.clone(),
        })?;

        let mut set = NamedSchemaSet::new();
        for index in 0..count {
            let key = self.entry_key(index);
            let raw = attributes
                .get(&key)
                .ok_or_else(|| DecodeError::MissingEntry(key.clone()))?;
            set.insert(decode_entry(&key, raw)?)?;
        }

        // References may point forward to any entry, so resolve once all are in
        set.validate()?;

        debug!(prefix = %self.prefix, schemas = set.len(), "Decoded schema set");
        Ok(set)
    }

    /// Decode, degrading to an empty set when the attributes are unusable
    pub fn decode_or_empty(&self, attributes: &Attributes) -> NamedSchemaSet {
        match self.decode(attributes) {
            Ok(set) => set,
            Err(DecodeError::MissingCount(key)) => {
                debug!(key = %key, "No stored schemas");
                NamedSchemaSet::new()
            }
            Err(e) => {
                warn!(error = %e, "Stored schemas are unreadable, treating as no schemas available");
                NamedSchemaSet::new()
            }
        }
    }
}

fn decode_entry(key: &str, raw: &str) -> Result<SchemaVersion, DecodeError> {
    let bytes = STANDARD.decode(raw).map_err(|source| DecodeError::Base64 {
        key: key.to_string(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| DecodeError::Utf8 { key: key.to_string() })?;
    let entry: StoredEntry = serde_json::from_str(&text).map_err(|source| DecodeError::Entry {
        key: key.to_string(),
        source,
    })?;

    let node = decode_node(&entry.schema).map_err(|e| match e {
        DecodeError::Node { path, message } => DecodeError::Node {
            path: format!("{}{}", entry.type_name, path),
            message,
        },
        other => other,
    })?;

    let version = SchemaVersion {
        type_name: entry.type_name,
        node,
        metadata: entry.metadata,
    };

    if let Some(expected) = entry.checksum {
        if !expected.verify(&version) {
            return Err(DecodeError::ChecksumMismatch {
                actual: Checksum::of_version(&version).to_string(),
                expected: expected.to_string(),
                type_name: version.type_name,
            });
        }
    }

    Ok(version)
}

/// Encode under the default prefix
pub fn encode_set(set: &NamedSchemaSet) -> Result<Attributes, SchemaModelError> {
    SetCodec::default().encode(set)
}

/// Decode under the default prefix
pub fn decode_set(attributes: &Attributes) -> Result<NamedSchemaSet, DecodeError> {
    SetCodec::default().decode(attributes)
}

/// Decode under the default prefix, empty on failure
pub fn decode_set_or_empty(attributes: &Attributes) -> NamedSchemaSet {
    SetCodec::default().decode_or_empty(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumSchema, Field, FixedSchema, RecordSchema, SchemaNode};

    fn sample_set() -> NamedSchemaSet {
        let user = RecordSchema::new("User")
            .with_field(Field::new("id", SchemaNode::int64()))
            .with_field(Field::new("status", SchemaNode::reference("Status")))
            .with_field(Field::new("address", SchemaNode::optional(SchemaNode::reference("Address"))).with_default(serde_json::Value::Null));
        let address = RecordSchema::new("Address")
            .with_field(Field::new("street", SchemaNode::string()))
            .with_field(Field::new("hash", FixedSchema::new("Md5", 16).into()));
        let status = EnumSchema::new("Status", ["Active", "Inactive"]).with_default_symbol("Inactive");

        NamedSchemaSet::from_versions([
            SchemaVersion::new("User", user).with_metadata("constraint", "non-empty"),
            SchemaVersion::new("Address", address),
            SchemaVersion::new("Status", status),
        ])
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let set = sample_set();
        let attributes = encode_set(&set).unwrap();
        assert_eq!(attributes.get("schema-evolution.count").map(String::as_str), Some("3"));
        assert_eq!(attributes.len(), 4);
        assert_eq!(decode_set(&attributes).unwrap(), set);
    }

    #[test]
    fn test_round_trip_preserves_defaults() {
        let record = RecordSchema::new("Settings")
            .with_field(Field::new("ratio", SchemaNode::float64()).with_default(json!(1.0715660391465826e-75)))
            .with_field(Field::new("scale", SchemaNode::float64()).with_default(json!(0.1)))
            .with_field(Field::new("retries", SchemaNode::int32()).with_default(json!(3)))
            .with_field(Field::new("offset", SchemaNode::int64()).with_default(json!(-9007199254740993_i64)))
            .with_field(Field::new("label", SchemaNode::string()).with_default(json!("n/a \"quoted\"")))
            .with_field(
                Field::new("tags", SchemaNode::map(SchemaNode::string()))
                    .with_default(json!({"zone": "eu", "tier": "gold"})),
            );
        let set = NamedSchemaSet::from_versions([SchemaVersion::new("Settings", record)]).unwrap();

        let attributes = encode_set(&set).unwrap();
        assert_eq!(decode_set(&attributes).unwrap(), set);
    }

    #[test]
    fn test_entries_are_in_type_name_order() {
        let attributes = encode_set(&sample_set()).unwrap();
        let first = STANDARD.decode(&attributes["schema-evolution.0"]).unwrap();
        let entry: StoredEntry = serde_json::from_slice(&first).unwrap();
        assert_eq!(entry.type_name, "Address");
    }

    #[test]
    fn test_custom_prefix() {
        let codec = SetCodec::new("build.schemas");
        let attributes = codec.encode(&sample_set()).unwrap();
        assert!(attributes.contains_key("build.schemas.count"));
        assert!(decode_set(&attributes).is_err());
        assert_eq!(codec.decode(&attributes).unwrap(), sample_set());
    }

    #[test]
    fn test_missing_count_fails_closed() {
        let mut attributes = encode_set(&sample_set()).unwrap();
        attributes.remove("schema-evolution.count");
        assert!(matches!(decode_set(&attributes), Err(DecodeError::MissingCount(_))));
        assert!(decode_set_or_empty(&attributes).is_empty());
    }

    #[test]
    fn test_non_numeric_count_fails_closed() {
        let mut attributes = encode_set(&sample_set()).unwrap();
        attributes.insert("schema-evolution.count".to_string(), "three".to_string());
        assert!(matches!(decode_set(&attributes), Err(DecodeError::InvalidCount { .. })));
    }

    #[test]
    fn test_corrupt_entry_fails_whole_set() {
        let mut attributes = encode_set(&sample_set()).unwrap();
        attributes.insert("schema-evolution.1".to_string(), "%%% not base64".to_string());
        assert!(matches!(decode_set(&attributes), Err(DecodeError::Base64 { .. })));
        assert!(decode_set_or_empty(&attributes).is_empty());

        let mut attributes = encode_set(&sample_set()).unwrap();
        attributes.insert("schema-evolution.1".to_string(), STANDARD.encode("{\"oops\":1}"));
        assert!(matches!(decode_set(&attributes), Err(DecodeError::Entry { .. })));
    }

    #[test]
    fn test_missing_entry_fails_closed() {
        let mut attributes = encode_set(&sample_set()).unwrap();
        attributes.remove("schema-evolution.2");
        assert!(matches!(
            decode_set(&attributes),
            Err(DecodeError::MissingEntry(ref key)) if key == "schema-evolution.2"
        ));
        assert!(decode_set_or_empty(&attributes).is_empty());
    }

    #[test]
    fn test_duplicate_type_name_fails_whole_set() {
        let mut attributes = encode_set(&sample_set()).unwrap();
        let first = attributes["schema-evolution.0"].clone();
        attributes.insert("schema-evolution.1".to_string(), first);
        assert!(matches!(
            decode_set(&attributes),
            Err(DecodeError::Model(SchemaModelError::DuplicateTypeName(ref name))) if name == "Address"
        ));
        assert!(decode_set_or_empty(&attributes).is_empty());
    }

    #[test]
    fn test_non_utf8_entry_fails_closed() {
        let mut attributes = encode_set(&sample_set()).unwrap();
        attributes.insert("schema-evolution.0".to_string(), STANDARD.encode([0xff, 0xfe, 0x7b]));
        assert!(matches!(
            decode_set(&attributes),
            Err(DecodeError::Utf8 { ref key }) if key == "schema-evolution.0"
        ));
    }

    #[test]
    fn test_missing_optional_entry_fields_tolerated() {
        let mut attributes = Attributes::new();
        attributes.insert("schema-evolution.count".to_string(), "1".to_string());
        attributes.insert(
            "schema-evolution.0".to_string(),
            STANDARD.encode(r#"{"typeName":"Id","schema":"\"int64\""}"#),
        );
        let set = decode_set(&attributes).unwrap();
        assert_eq!(set.get("Id").map(|v| &v.node), Some(&SchemaNode::int64()));
        assert!(set.get("Id").map(|v| v.metadata.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut attributes = Attributes::new();
        attributes.insert("schema-evolution.count".to_string(), "1".to_string());
        attributes.insert(
            "schema-evolution.0".to_string(),
            STANDARD.encode(r#"{"typeName":"Id","schema":"\"int64\"","checksum":"deadbeef"}"#),
        );
        assert!(matches!(decode_set(&attributes), Err(DecodeError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_unresolved_reference_is_decode_error() {
        let mut attributes = Attributes::new();
        attributes.insert("schema-evolution.count".to_string(), "1".to_string());
        attributes.insert(
            "schema-evolution.0".to_string(),
            STANDARD.encode(r#"{"typeName":"Order","schema":"{\"type\":\"array\",\"items\":\"Line\"}"}"#),
        );
        assert!(matches!(
            decode_set(&attributes),
            Err(DecodeError::Model(SchemaModelError::UnresolvedReference(ref name))) if name == "Line"
        ));
    }

    #[test]
    fn test_cyclic_set_cannot_be_encoded() {
        let a = RecordSchema::new("A").with_field(Field::new("b", SchemaNode::reference("B")));
        let b = RecordSchema::new("B").with_field(Field::new("a", SchemaNode::reference("A")));
        let set = NamedSchemaSet::from_versions([SchemaVersion::new("A", a), SchemaVersion::new("B", b)]).unwrap();
        assert_eq!(
            encode_set(&set),
            Err(SchemaModelError::CyclicReference(vec!["A".to_string(), "B".to_string()]))
        );
    }
}
