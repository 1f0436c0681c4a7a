//! Compact schema text
//!
//! Avro-like JSON: primitives are bare keywords, named types are objects
//! with a `type` tag, unions are arrays and references are bare names.
//!
//! ```text
//! {"fields":[{"name":"id","type":"int64"},
//!            {"default":null,"name":"email","type":["null","string"]}],
//!  "name":"User","type":"record"}
//! ```

use serde_json::{json, Map, Value};

use crate::error::DecodeError;
use crate::schema::{EnumSchema, Field, FixedSchema, PrimitiveKind, RecordSchema, SchemaNode};

/// Serialize a node to its compact text form
pub fn encode_node(node: &SchemaNode) -> String {
    node_to_value(node).to_string()
}

/// Parse compact schema text
pub fn decode_node(text: &str) -> Result<SchemaNode, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    value_to_node(&value, "")
}

pub fn node_to_value(node: &SchemaNode) -> Value {
    match node {
        SchemaNode::Primitive(kind) => Value::String(kind.as_str().to_string()),
        SchemaNode::Logical { base, tag } => json!({
            "type": base.as_str(),
            "logicalType": tag,
        }),
        SchemaNode::Record(record) => {
            let fields: Vec<Value> = record
                .fields
                .iter()
                .map(|field| {
                    let mut obj = Map::new();
                    obj.insert("name".to_string(), Value::String(field.name.clone()));
                    obj.insert("type".to_string(), node_to_value(&field.node));
                    if let Some(default) = &field.default {
                        obj.insert("default".to_string(), default.clone());
                    }
                    Value::Object(obj)
                })
                .collect();
            json!({
                "type": "record",
                "name": record.name,
                "fields": fields,
            })
        }
        SchemaNode::Enum(e) => {
            let mut obj = Map::new();
            obj.insert("type".to_string(), json!("enum"));
            obj.insert("name".to_string(), json!(e.name));
            obj.insert("symbols".to_string(), json!(e.symbols));
            if let Some(default) = &e.default_symbol {
                obj.insert("default".to_string(), json!(default));
            }
            Value::Object(obj)
        }
        SchemaNode::Array(items) => json!({
            "type": "array",
            "items": node_to_value(items),
        }),
        SchemaNode::Map(values) => json!({
            "type": "map",
            "values": node_to_value(values),
        }),
        SchemaNode::Union(branches) => Value::Array(branches.iter().map(node_to_value).collect()),
        SchemaNode::Fixed(fixed) => json!({
            "type": "fixed",
            "name": fixed.name,
            "size": fixed.size,
        }),
        SchemaNode::Ref(name) => Value::String(name.clone()),
    }
}

pub fn value_to_node(value: &Value, path: &str) -> Result<SchemaNode, DecodeError> {
    match value {
        Value::String(keyword) => Ok(match PrimitiveKind::from_keyword(keyword) {
            Some(kind) => SchemaNode::Primitive(kind),
            None if keyword.is_empty() => {
                return Err(DecodeError::node(path, "empty type name"));
            }
            None => SchemaNode::Ref(keyword.clone()),
        }),
        Value::Array(branches) => {
            let nodes = branches
                .iter()
                .enumerate()
                .map(|(i, branch)| value_to_node(branch, &format!("{}/branches/{}", path, i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SchemaNode::Union(nodes))
        }
        Value::Object(obj) => object_to_node(obj, path),
        other => Err(DecodeError::node(
            path,
            format!("expected a type name, object or array, found {}", other),
        )),
    }
}

fn object_to_node(obj: &Map<String, Value>, path: &str) -> Result<SchemaNode, DecodeError> {
    let type_value = obj
        .get("type")
        .ok_or_else(|| DecodeError::node(path, "missing 'type'"))?;

    let tag = match type_value {
        Value::String(tag) => tag.as_str(),
        // {"type": {...}} wraps a nested schema
        nested => return value_to_node(nested, path),
    };

    if let Some(base) = PrimitiveKind::from_keyword(tag) {
        return match obj.get("logicalType") {
            Some(Value::String(logical)) => Ok(SchemaNode::Logical {
                base,
                tag: logical.clone(),
            }),
            Some(other) => Err(DecodeError::node(
                path,
                format!("'logicalType' must be a string, found {}", other),
            )),
            None => Ok(SchemaNode::Primitive(base)),
        };
    }

    match tag {
        "record" => {
            let name = required_str(obj, "name", path)?;
            let mut record = RecordSchema::new(name);
            if let Some(fields) = obj.get("fields") {
                let fields = fields
                    .as_array()
                    .ok_or_else(|| DecodeError::node(path, "'fields' must be an array"))?;
                for (index, field) in fields.iter().enumerate() {
                    let field_obj = field.as_object().ok_or_else(|| {
                        DecodeError::node(format!("{}/fields/{}", path, index), "field must be an object")
                    })?;
                    let field_name = required_str(field_obj, "name", &format!("{}/fields/{}", path, index))?;
                    let field_path = format!("{}/fields/{}", path, field_name);
                    let field_type = field_obj
                        .get("type")
                        .ok_or_else(|| DecodeError::node(&field_path, "missing 'type'"))?;
                    let mut decoded = Field::new(field_name, value_to_node(field_type, &format!("{}/type", field_path))?);
                    decoded.default = field_obj.get("default").cloned();
                    record = record.with_field(decoded);
                }
            }
            Ok(SchemaNode::Record(record))
        }
        "enum" => {
            let name = required_str(obj, "name", path)?;
            let symbols = match obj.get("symbols") {
                Some(Value::Array(symbols)) => symbols
                    .iter()
                    .map(|s| {
                        s.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| DecodeError::node(path, "enum symbols must be strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => return Err(DecodeError::node(path, "'symbols' must be an array")),
                None => Vec::new(),
            };
            let mut e = EnumSchema::new(name, symbols);
            e.default_symbol = match obj.get("default") {
                Some(Value::String(symbol)) => Some(symbol.clone()),
                Some(Value::Null) | None => None,
                Some(_) => return Err(DecodeError::node(path, "enum default must be a string")),
            };
            Ok(SchemaNode::Enum(e))
        }
        "array" => {
            let items = obj
                .get("items")
                .ok_or_else(|| DecodeError::node(path, "array is missing 'items'"))?;
            Ok(SchemaNode::array(value_to_node(items, &format!("{}/items", path))?))
        }
        "map" => {
            let values = obj
                .get("values")
                .ok_or_else(|| DecodeError::node(path, "map is missing 'values'"))?;
            Ok(SchemaNode::map(value_to_node(values, &format!("{}/values", path))?))
        }
        "fixed" => {
            let name = required_str(obj, "name", path)?;
            let size = obj
                .get("size")
                .and_then(Value::as_u64)
                .ok_or_else(|| DecodeError::node(path, "fixed needs a non-negative integer 'size'"))?;
            Ok(SchemaNode::Fixed(FixedSchema::new(name, size)))
        }
        // Named reference written in object form
        name => Ok(SchemaNode::Ref(name.to_string())),
    }
}

fn required_str<'v>(obj: &'v Map<String, Value>, key: &str, path: &str) -> Result<&'v str, DecodeError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::node(path, format!("missing string '{}'", key)))
}
