//! Schema Registry
//!
//! Collects the schemas a build produces. Compilation units register their
//! types concurrently; once they are done the build drains the registry
//! into a [`NamedSchemaSet`] and hands it to the storage codec.
//!
//! One registry belongs to one build. Call [`SchemaRegistry::reset`] (or
//! drain) before reusing an instance so nothing leaks between builds.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::codec::decode_node;
use crate::error::{DecodeError, SchemaModelError};
use crate::schema::{NamedSchemaSet, SchemaVersion};

/// Produces a schema from a native type declaration
pub trait SchemaSource {
    fn derive_schema(&self) -> SchemaVersion;
}

impl<F> SchemaSource for F
where
    F: Fn() -> SchemaVersion,
{
    fn derive_schema(&self) -> SchemaVersion {
        self()
    }
}

/// Thread-safe collection of schemas keyed by type name
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<HashMap<String, SchemaVersion>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are plain values and every write is a single insert, so a
    // panic in another thread cannot leave the map half-updated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SchemaVersion>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SchemaVersion>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a type from its encoded node text
    pub fn register(&self, type_name: impl Into<String>, encoded_node: &str) -> Result<(), DecodeError> {
        let type_name = type_name.into();
        let node = decode_node(encoded_node).map_err(|e| match e {
            DecodeError::Node { path, message } => DecodeError::Node {
                path: format!("{}{}", type_name, path),
                message,
            },
            other => other,
        })?;
        self.register_version(SchemaVersion::new(type_name, node))
            .map_err(DecodeError::from)
    }

    /// Register an already-built schema. A later registration of the same
    /// type name replaces the earlier one.
    pub fn register_version(&self, version: SchemaVersion) -> Result<(), SchemaModelError> {
        if version.type_name.trim().is_empty() {
            return Err(SchemaModelError::EmptyName);
        }
        let type_name = version.type_name.clone();
        if self.write().insert(type_name.clone(), version).is_some() {
            debug!(type_name = %type_name, "Replaced registered schema");
        }
        Ok(())
    }

    pub fn register_source(&self, source: &dyn SchemaSource) -> Result<(), SchemaModelError> {
        self.register_version(source.derive_schema())
    }

    /// Take everything registered so far, leaving the registry empty
    pub fn drain(&self) -> NamedSchemaSet {
        let entries = std::mem::take(&mut *self.write());
        debug!(schemas = entries.len(), "Drained schema registry");
        into_set(entries)
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> NamedSchemaSet {
        into_set(self.read().clone())
    }

    pub fn reset(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.read().contains_key(type_name)
    }
}

fn into_set(entries: HashMap<String, SchemaVersion>) -> NamedSchemaSet {
    let mut set = NamedSchemaSet::new();
    for version in entries.into_values() {
        // Keys are unique, so this cannot collide
        let _ = set.insert(version);
    }
    set
}
