//! Directional reader/writer resolution rules

use std::collections::HashSet;

use super::{Issue, IssueKind, Severity};
use crate::schema::{EnumSchema, FixedSchema, NamedTypes, RecordSchema, SchemaNode};

/// Walks a reader tree and a writer tree side by side
pub(crate) struct Comparator<'a> {
    reader_types: &'a NamedTypes<'a>,
    writer_types: &'a NamedTypes<'a>,
    /// (reader record, writer record) pairs currently being compared.
    /// Meeting one again means recursion: assumed compatible.
    in_progress: HashSet<(&'a str, &'a str)>,
}

impl<'a> Comparator<'a> {
    pub(crate) fn new(reader_types: &'a NamedTypes<'a>, writer_types: &'a NamedTypes<'a>) -> Self {
        Self {
            reader_types,
            writer_types,
            in_progress: HashSet::new(),
        }
    }

    pub(crate) fn run(mut self, reader: &'a SchemaNode, writer: &'a SchemaNode) -> Vec<Issue> {
        self.compare(reader, writer, "")
    }

    fn compare(&mut self, reader: &'a SchemaNode, writer: &'a SchemaNode, path: &str) -> Vec<Issue> {
        if matches!(reader, SchemaNode::Union(_)) || matches!(writer, SchemaNode::Union(_)) {
            return self.compare_unions(reader, writer, path);
        }

        let reader = match resolve(reader, self.reader_types) {
            Ok(node) => node,
            Err(name) => return vec![unresolved("reader", name, path)],
        };
        let writer = match resolve(writer, self.writer_types) {
            Ok(node) => node,
            Err(name) => return vec![unresolved("writer", name, path)],
        };

        match (reader, writer) {
            (SchemaNode::Primitive(r), SchemaNode::Primitive(w)) => {
                if r.can_read(*w) {
                    Vec::new()
                } else {
                    vec![mismatch(reader, writer, path)]
                }
            }
            (
                SchemaNode::Logical { base: rb, tag: rt },
                SchemaNode::Logical { base: wb, tag: wt },
            ) => {
                if rt != wt {
                    vec![Issue::error(
                        IssueKind::TypeMismatch,
                        path,
                        format!("logical type '{}' cannot read logical type '{}'", rt, wt),
                    )]
                } else if !rb.can_read(*wb) {
                    vec![mismatch(reader, writer, path)]
                } else {
                    Vec::new()
                }
            }
            (SchemaNode::Record(r), SchemaNode::Record(w)) => self.compare_records(r, w, path),
            (SchemaNode::Enum(r), SchemaNode::Enum(w)) => compare_enums(r, w, path),
            (SchemaNode::Array(r), SchemaNode::Array(w)) => {
                self.compare(r, w, &format!("{}/items", path))
            }
            (SchemaNode::Map(r), SchemaNode::Map(w)) => {
                self.compare(r, w, &format!("{}/values", path))
            }
            (SchemaNode::Fixed(r), SchemaNode::Fixed(w)) => compare_fixed(r, w, path),
            _ => vec![mismatch(reader, writer, path)],
        }
    }

    fn compare_records(&mut self, reader: &'a RecordSchema, writer: &'a RecordSchema, path: &str) -> Vec<Issue> {
        let key = (reader.name.as_str(), writer.name.as_str());
        if !self.in_progress.insert(key) {
            return Vec::new();
        }

        let mut issues = Vec::new();
        for field in &reader.fields {
            let field_path = format!("{}/fields/{}", path, field.name);
            match writer.field(&field.name) {
                Some(written) => issues.extend(self.compare(&field.node, &written.node, &field_path)),
                None if field.has_default() => issues.push(Issue::info(
                    IssueKind::FieldAdded,
                    field_path,
                    format!(
                        "field '{}' is not written by the writer; the reader fills it from its default",
                        field.name
                    ),
                )),
                None => issues.push(Issue::error(
                    IssueKind::MissingDefaultValue,
                    field_path,
                    format!(
                        "reader expects field '{}' which the writer does not supply and it has no default",
                        field.name
                    ),
                )),
            }
        }

        for written in &writer.fields {
            if reader.field(&written.name).is_none() {
                issues.push(Issue::info(
                    IssueKind::FieldRemoved,
                    format!("{}/fields/{}", path, written.name),
                    format!("writer field '{}' is ignored by the reader", written.name),
                ));
            }
        }

        self.in_progress.remove(&key);
        issues
    }

    fn compare_unions(&mut self, reader: &'a SchemaNode, writer: &'a SchemaNode, path: &str) -> Vec<Issue> {
        let reader_branches: Vec<&'a SchemaNode> = match reader {
            SchemaNode::Union(branches) => branches.iter().collect(),
            single => vec![single],
        };
        let (writer_branches, writer_is_union): (Vec<&'a SchemaNode>, bool) = match writer {
            SchemaNode::Union(branches) => (branches.iter().collect(), true),
            single => (vec![single], false),
        };

        let mut issues = Vec::new();
        for (index, branch) in writer_branches.into_iter().enumerate() {
            let branch_path = if writer_is_union {
                format!("{}/branches/{}", path, index)
            } else {
                path.to_string()
            };
            match self.match_branch(&reader_branches, branch, &branch_path) {
                Some(found) => issues.extend(found),
                None => issues.push(Issue::error(
                    IssueKind::UnionBranchMissing,
                    branch_path,
                    format!(
                        "writer branch {} has no compatible reader branch",
                        branch.kind_label()
                    ),
                )),
            }
        }
        issues
    }

    /// Best-effort branch resolution: the reader branch with the writer's
    /// discriminant first, then any other branch, taking the first that
    /// reads the writer branch without errors.
    fn match_branch(
        &mut self,
        reader_branches: &[&'a SchemaNode],
        writer_branch: &'a SchemaNode,
        path: &str,
    ) -> Option<Vec<Issue>> {
        let wanted = writer_branch.discriminant();
        let preferred = reader_branches
            .iter()
            .position(|candidate| candidate.discriminant() == wanted);
        let order = preferred
            .into_iter()
            .chain((0..reader_branches.len()).filter(|i| Some(*i) != preferred));

        for index in order {
            let found = self.compare(reader_branches[index], writer_branch, path);
            if !found.iter().any(|issue| issue.severity == Severity::Error) {
                return Some(found);
            }
        }
        None
    }
}

/// Follow a reference to its definition. Errors carry the unresolved name.
fn resolve<'a>(node: &'a SchemaNode, types: &NamedTypes<'a>) -> Result<&'a SchemaNode, &'a str> {
    match node {
        SchemaNode::Ref(name) => types.resolve(name).ok_or(name.as_str()),
        other => Ok(other),
    }
}

fn compare_enums(reader: &EnumSchema, writer: &EnumSchema, path: &str) -> Vec<Issue> {
    writer
        .symbols
        .iter()
        .filter(|symbol| !reader.has_symbol(symbol))
        .map(|symbol| {
            let symbol_path = format!("{}/symbols/{}", path, symbol);
            match &reader.default_symbol {
                Some(default) => Issue::warning(
                    IssueKind::EnumSymbolMissing,
                    symbol_path,
                    format!(
                        "writer symbol '{}' is unknown to the reader and will read as '{}'",
                        symbol, default
                    ),
                ),
                None => Issue::error(
                    IssueKind::EnumSymbolMissing,
                    symbol_path,
                    format!("writer symbol '{}' is unknown to the reader", symbol),
                ),
            }
        })
        .collect()
}

fn compare_fixed(reader: &FixedSchema, writer: &FixedSchema, path: &str) -> Vec<Issue> {
    if reader.name == writer.name && reader.size == writer.size {
        return Vec::new();
    }
    vec![Issue::error(
        IssueKind::SizeMismatch,
        path,
        format!(
            "fixed {}({}) cannot be read as fixed {}({})",
            writer.name, writer.size, reader.name, reader.size
        ),
    )]
}

fn mismatch(reader: &SchemaNode, writer: &SchemaNode, path: &str) -> Issue {
    Issue::error(
        IssueKind::TypeMismatch,
        path,
        format!(
            "reader type {} cannot read writer type {}",
            reader.kind_label(),
            writer.kind_label()
        ),
    )
}

fn unresolved(side: &str, name: &str, path: &str) -> Issue {
    Issue::error(
        IssueKind::TypeMismatch,
        path,
        format!("{} references unknown named type {}", side, name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::check_directional;
    use crate::schema::{Field, PrimitiveKind};

    fn kinds(issues: &[Issue]) -> Vec<(IssueKind, Severity, &str)> {
        issues.iter().map(|i| (i.kind, i.severity, i.path.as_str())).collect()
    }

    #[test]
    fn test_primitive_promotion() {
        assert!(check_directional(&SchemaNode::int64(), &SchemaNode::int32()).is_empty());
        assert!(check_directional(&SchemaNode::float64(), &SchemaNode::int64()).is_empty());
        assert!(check_directional(&SchemaNode::bytes(), &SchemaNode::string()).is_empty());

        let issues = check_directional(&SchemaNode::int32(), &SchemaNode::int64());
        assert_eq!(kinds(&issues), vec![(IssueKind::TypeMismatch, Severity::Error, "/")]);
    }

    #[test]
    fn test_logical_tags_must_match() {
        let uuid = SchemaNode::logical(PrimitiveKind::String, "uuid");
        let plain = SchemaNode::string();
        assert!(check_directional(&uuid, &uuid).is_empty());
        assert_eq!(check_directional(&uuid, &plain).len(), 1);
        assert_eq!(check_directional(&plain, &uuid).len(), 1);

        let decimal = SchemaNode::logical(PrimitiveKind::Bytes, "decimal");
        let issues = check_directional(&decimal, &SchemaNode::logical(PrimitiveKind::Bytes, "uuid"));
        assert_eq!(issues[0].kind, IssueKind::TypeMismatch);

        let millis64 = SchemaNode::logical(PrimitiveKind::Int64, "timestamp-millis");
        let millis32 = SchemaNode::logical(PrimitiveKind::Int32, "timestamp-millis");
        assert!(check_directional(&millis64, &millis32).is_empty());
    }

    #[test]
    fn test_nested_paths() {
        let reader = SchemaNode::Record(
            RecordSchema::new("Order").with_field(Field::new(
                "lines",
                SchemaNode::array(SchemaNode::map(SchemaNode::int32())),
            )),
        );
        let writer = SchemaNode::Record(
            RecordSchema::new("Order").with_field(Field::new(
                "lines",
                SchemaNode::array(SchemaNode::map(SchemaNode::string())),
            )),
        );
        let issues = check_directional(&reader, &writer);
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::TypeMismatch, Severity::Error, "/fields/lines/items/values")]
        );
    }

    #[test]
    fn test_reader_default_fills_missing_field() {
        let reader = SchemaNode::Record(
            RecordSchema::new("User")
                .with_field(Field::new("id", SchemaNode::int64()))
                .with_field(Field::new("nickname", SchemaNode::string()).with_default(serde_json::json!(""))),
        );
        let writer = SchemaNode::Record(RecordSchema::new("User").with_field(Field::new("id", SchemaNode::int64())));
        let issues = check_directional(&reader, &writer);
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::FieldAdded, Severity::Info, "/fields/nickname")]
        );
    }

    #[test]
    fn test_enum_default_symbol_downgrades_to_warning() {
        let reader: SchemaNode = EnumSchema::new("Status", ["Active", "Unknown"])
            .with_default_symbol("Unknown")
            .into();
        let writer: SchemaNode = EnumSchema::new("Status", ["Active", "Suspended"]).into();
        let issues = check_directional(&reader, &writer);
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::EnumSymbolMissing, Severity::Warning, "/symbols/Suspended")]
        );
    }

    #[test]
    fn test_union_branch_resolution() {
        let reader = SchemaNode::union([SchemaNode::null(), SchemaNode::int64()]);
        let writer = SchemaNode::union([SchemaNode::null(), SchemaNode::int32(), SchemaNode::string()]);
        let issues = check_directional(&reader, &writer);
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::UnionBranchMissing, Severity::Error, "/branches/2")]
        );
    }

    #[test]
    fn test_non_union_sides_act_as_single_branch() {
        let optional = SchemaNode::optional(SchemaNode::string());
        assert!(check_directional(&optional, &SchemaNode::string()).is_empty());

        let issues = check_directional(&SchemaNode::string(), &optional);
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::UnionBranchMissing, Severity::Error, "/branches/0")]
        );

        let issues = check_directional(&optional, &SchemaNode::boolean());
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::UnionBranchMissing, Severity::Error, "/")]
        );
    }

    #[test]
    fn test_union_keeps_non_error_issues_of_match() {
        let reader = SchemaNode::optional(
            RecordSchema::new("Address")
                .with_field(Field::new("street", SchemaNode::string()))
                .into(),
        );
        let writer = SchemaNode::optional(
            RecordSchema::new("Address")
                .with_field(Field::new("street", SchemaNode::string()))
                .with_field(Field::new("zip", SchemaNode::string()))
                .into(),
        );
        let issues = check_directional(&reader, &writer);
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::FieldRemoved, Severity::Info, "/branches/1/fields/zip")]
        );
    }

    #[test]
    fn test_fixed_size_and_name() {
        let reader: SchemaNode = FixedSchema::new("Hash", 32).into();
        assert!(check_directional(&reader, &FixedSchema::new("Hash", 32).into()).is_empty());
        let issues = check_directional(&reader, &FixedSchema::new("Hash", 16).into());
        assert_eq!(kinds(&issues), vec![(IssueKind::SizeMismatch, Severity::Error, "/")]);
        let issues = check_directional(&reader, &FixedSchema::new("Digest", 32).into());
        assert_eq!(issues[0].kind, IssueKind::SizeMismatch);
    }

    #[test]
    fn test_cross_kind_mismatch() {
        let issues = check_directional(&SchemaNode::array(SchemaNode::int32()), &SchemaNode::map(SchemaNode::int32()));
        assert_eq!(kinds(&issues), vec![(IssueKind::TypeMismatch, Severity::Error, "/")]);
    }

    #[test]
    fn test_recursive_types_terminate() {
        let tree = |value: SchemaNode| -> SchemaNode {
            RecordSchema::new("Tree")
                .with_field(Field::new("value", value))
                .with_field(Field::new("children", SchemaNode::array(SchemaNode::reference("Tree"))))
                .into()
        };
        assert!(check_directional(&tree(SchemaNode::int64()), &tree(SchemaNode::int32())).is_empty());

        let issues = check_directional(&tree(SchemaNode::int32()), &tree(SchemaNode::int64()));
        assert_eq!(
            kinds(&issues),
            vec![(IssueKind::TypeMismatch, Severity::Error, "/fields/value")]
        );
    }

    #[test]
    fn test_unresolved_reference_reported() {
        let issues = check_directional(&SchemaNode::reference("Ghost"), &SchemaNode::int32());
        assert_eq!(kinds(&issues), vec![(IssueKind::TypeMismatch, Severity::Error, "/")]);
        assert!(issues[0].message.contains("Ghost"));
    }
}
