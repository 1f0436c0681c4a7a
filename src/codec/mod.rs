//! Schema codec
//!
//! Two layers:
//! - [`node`]: a single schema tree ↔ compact text
//! - [`attributes`]: a whole [`NamedSchemaSet`](crate::schema::NamedSchemaSet)
//!   ↔ flat string attributes for artifact storage

pub mod attributes;
pub mod node;

pub use attributes::{
    decode_set, decode_set_or_empty, encode_set, Attributes, SetCodec, DEFAULT_PREFIX,
};
pub use node::{decode_node, encode_node};
