//! Structural invariants of a schema tree

use std::collections::HashSet;

use super::{NamedTypes, SchemaNode};
use crate::error::SchemaModelError;

pub(crate) fn validate_tree(node: &SchemaNode, named: &NamedTypes<'_>) -> Result<(), SchemaModelError> {
    match node {
        SchemaNode::Primitive(_) => Ok(()),
        SchemaNode::Logical { base, tag } => {
            if tag.trim().is_empty() {
                return Err(SchemaModelError::EmptyLogicalTag(base.to_string()));
            }
            Ok(())
        }
        SchemaNode::Record(record) => {
            let mut seen = HashSet::new();
            for (index, field) in record.fields.iter().enumerate() {
                if !seen.insert(field.name.as_str()) {
                    return Err(SchemaModelError::DuplicateField {
                        record: record.name.clone(),
                        field: field.name.clone(),
                    });
                }
                if field.position as usize != index {
                    return Err(SchemaModelError::FieldPosition {
                        record: record.name.clone(),
                        field: field.name.clone(),
                        position: field.position,
                        expected: index as u32,
                    });
                }
                validate_tree(&field.node, named)?;
            }
            Ok(())
        }
        SchemaNode::Enum(e) => {
            if e.symbols.is_empty() {
                return Err(SchemaModelError::EmptyEnum(e.name.clone()));
            }
            let mut seen = HashSet::new();
            for symbol in &e.symbols {
                if !seen.insert(symbol.as_str()) {
                    return Err(SchemaModelError::DuplicateSymbol {
                        name: e.name.clone(),
                        symbol: symbol.clone(),
                    });
                }
            }
            match &e.default_symbol {
                Some(symbol) if !e.has_symbol(symbol) => Err(SchemaModelError::UnknownDefaultSymbol {
                    name: e.name.clone(),
                    symbol: symbol.clone(),
                }),
                _ => Ok(()),
            }
        }
        SchemaNode::Array(items) => validate_tree(items, named),
        SchemaNode::Map(values) => validate_tree(values, named),
        SchemaNode::Union(branches) => {
            if branches.is_empty() {
                return Err(SchemaModelError::EmptyUnion);
            }
            let mut seen = HashSet::new();
            for branch in branches {
                if matches!(branch, SchemaNode::Union(_)) {
                    return Err(SchemaModelError::NestedUnion);
                }
                let discriminant = branch.discriminant();
                if !seen.insert(discriminant.clone()) {
                    return Err(SchemaModelError::AmbiguousUnion(discriminant.to_string()));
                }
                validate_tree(branch, named)?;
            }
            Ok(())
        }
        SchemaNode::Fixed(_) => Ok(()),
        SchemaNode::Ref(name) => {
            if named.contains(name) {
                Ok(())
            } else {
                Err(SchemaModelError::UnresolvedReference(name.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SchemaModelError;
    use crate::schema::{EnumSchema, Field, RecordSchema, SchemaNode};

    #[test]
    fn test_duplicate_field_rejected() {
        let node: SchemaNode = RecordSchema::new("User")
            .with_field(Field::new("id", SchemaNode::int64()))
            .with_field(Field::new("id", SchemaNode::string()))
            .into();
        assert!(matches!(
            node.validate(),
            Err(SchemaModelError::DuplicateField { ref field, .. }) if field == "id"
        ));
    }

    #[test]
    fn test_union_branches_must_be_distinguishable() {
        let node = SchemaNode::union([SchemaNode::string(), SchemaNode::int32(), SchemaNode::string()]);
        assert_eq!(
            node.validate(),
            Err(SchemaModelError::AmbiguousUnion("string".to_string()))
        );
        assert_eq!(SchemaNode::Union(Vec::new()).validate(), Err(SchemaModelError::EmptyUnion));
    }

    #[test]
    fn test_enum_invariants() {
        let empty: SchemaNode = EnumSchema::new("Empty", Vec::<String>::new()).into();
        assert_eq!(empty.validate(), Err(SchemaModelError::EmptyEnum("Empty".to_string())));

        let bad_default: SchemaNode = EnumSchema::new("Status", ["Active"])
            .with_default_symbol("Unknown")
            .into();
        assert!(matches!(
            bad_default.validate(),
            Err(SchemaModelError::UnknownDefaultSymbol { .. })
        ));
    }

    #[test]
    fn test_unresolved_reference() {
        let node = SchemaNode::array(SchemaNode::reference("Ghost"));
        assert_eq!(
            node.validate(),
            Err(SchemaModelError::UnresolvedReference("Ghost".to_string()))
        );
    }

    #[test]
    fn test_field_positions_must_be_contiguous() {
        let mut record = RecordSchema::new("User")
            .with_field(Field::new("id", SchemaNode::int64()))
            .with_field(Field::new("name", SchemaNode::string()));
        record.fields[1].position = 7;
        assert!(matches!(
            SchemaNode::Record(record).validate(),
            Err(SchemaModelError::FieldPosition { position: 7, expected: 1, .. })
        ));
    }
}
