//! Checksum utilities for stored schema entries

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::encode_node;
use crate::schema::{NamedTypes, SchemaVersion};

/// SHA256 checksum of a schema entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Checksum over the canonical schema text and sorted metadata.
    ///
    /// The type name is excluded so a renamed but otherwise identical type
    /// keeps its checksum. Every part is length-prefixed, so no two distinct
    /// metadata maps hash the same input.
    pub fn of_version(version: &SchemaVersion) -> Self {
        let mut hasher = Sha256::new();
        frame(&mut hasher, encode_node(&version.node).as_bytes());
        for (key, value) in &version.metadata {
            frame(&mut hasher, key.as_bytes());
            frame(&mut hasher, value.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Checksum of a version together with every named definition it
    /// reaches through references in `types`.
    ///
    /// Two versions with equal closures compare without issues, even when
    /// the referenced types live in other entries of the set.
    pub fn of_closure(version: &SchemaVersion, types: &NamedTypes<'_>) -> Self {
        let mut hasher = Sha256::new();
        frame(&mut hasher, Self::of_version(version).as_str().as_bytes());
        for (name, node) in types.reachable_from(&version.node) {
            frame(&mut hasher, name.as_bytes());
            frame(&mut hasher, encode_node(node).as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a schema entry matches this checksum
    pub fn verify(&self, version: &SchemaVersion) -> bool {
        *self == Self::of_version(version)
    }
}

fn frame(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, NamedSchemaSet, RecordSchema, SchemaNode};

    #[test]
    fn test_checksum_consistency() {
        let version = SchemaVersion::new("Id", SchemaNode::int64());
        assert_eq!(Checksum::of_version(&version), Checksum::of_version(&version.clone()));
        assert_eq!(Checksum::of_version(&version).as_str().len(), 64);
    }

    #[test]
    fn test_checksum_covers_metadata() {
        let plain = SchemaVersion::new("Email", SchemaNode::string());
        let constrained = plain.clone().with_metadata("constraint", "non-empty");
        assert_ne!(Checksum::of_version(&plain), Checksum::of_version(&constrained));
    }

    #[test]
    fn test_metadata_boundaries_are_unambiguous() {
        let left = SchemaVersion::new("Tag", SchemaNode::string()).with_metadata("a=b", "c");
        let right = SchemaVersion::new("Tag", SchemaNode::string()).with_metadata("a", "b=c");
        assert_ne!(Checksum::of_version(&left), Checksum::of_version(&right));

        let split = SchemaVersion::new("Tag", SchemaNode::string())
            .with_metadata("a", "x\nb=y");
        let joined = SchemaVersion::new("Tag", SchemaNode::string())
            .with_metadata("a", "x")
            .with_metadata("b", "y");
        assert_ne!(Checksum::of_version(&split), Checksum::of_version(&joined));
    }

    #[test]
    fn test_checksum_verification() {
        let version = SchemaVersion::new("Flag", SchemaNode::boolean());
        let checksum = Checksum::of_version(&version);
        assert!(checksum.verify(&version));
        assert!(!checksum.verify(&SchemaVersion::new("Flag", SchemaNode::string())));
    }

    #[test]
    fn test_closure_follows_references() {
        let order = SchemaVersion::new(
            "Order",
            RecordSchema::new("Order").with_field(Field::new("ship_to", SchemaNode::reference("Address"))),
        );
        let address = |fields: &[&str]| {
            let record = fields
                .iter()
                .fold(RecordSchema::new("Address"), |r, f| r.with_field(Field::new(*f, SchemaNode::string())));
            SchemaVersion::new("Address", record)
        };

        let before = NamedSchemaSet::from_versions([order.clone(), address(&["street"])]).unwrap();
        let after = NamedSchemaSet::from_versions([order.clone(), address(&["street", "zip"])]).unwrap();

        assert_ne!(
            Checksum::of_closure(&order, &before.named_types()),
            Checksum::of_closure(&order, &after.named_types())
        );
    }
}
