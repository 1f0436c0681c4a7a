//! Named type index
//!
//! Records, enums and fixed types are identified by name. A schema set may
//! define a named type inline once and refer to it elsewhere by name, so
//! comparison and validation both need a name → definition lookup.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use super::{PrimitiveKind, SchemaNode};
use crate::error::SchemaModelError;

/// Lookup of named type definitions borrowed from one or more trees
#[derive(Debug, Clone, Default)]
pub struct NamedTypes<'a> {
    defs: BTreeMap<&'a str, &'a SchemaNode>,
}

impl<'a> NamedTypes<'a> {
    /// Index every named definition inside `node`
    pub fn from_node(node: &'a SchemaNode) -> Self {
        let mut named = Self::default();
        named.collect(node);
        named
    }

    /// Add definitions from `node`. The first definition of a name wins.
    pub fn collect(&mut self, node: &'a SchemaNode) {
        walk(node, &mut |n| {
            if let Some(name) = definition_name(n) {
                self.defs.entry(name).or_insert(n);
            }
        });
    }

    /// Strict variant of [`collect`](Self::collect) used by validation
    pub(crate) fn define_all(&mut self, node: &'a SchemaNode) -> Result<(), SchemaModelError> {
        let mut result = Ok(());
        walk(node, &mut |n| {
            if result.is_err() {
                return;
            }
            if let Some(name) = definition_name(n) {
                result = self.define(name, n);
            }
        });
        result
    }

    fn define(&mut self, name: &'a str, node: &'a SchemaNode) -> Result<(), SchemaModelError> {
        if name.is_empty() {
            return Err(SchemaModelError::EmptyName);
        }
        if PrimitiveKind::from_keyword(name).is_some() {
            return Err(SchemaModelError::ReservedName(name.to_string()));
        }
        match self.defs.get(name) {
            Some(existing) if *existing != node => {
                Err(SchemaModelError::ConflictingDefinition(name.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.defs.insert(name, node);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&'a SchemaNode> {
        self.defs.get(name).copied()
    }

    /// Definitions reachable from `node` through references, transitively.
    /// Unresolvable names are skipped.
    pub fn reachable_from(&self, node: &SchemaNode) -> BTreeMap<&'a str, &'a SchemaNode> {
        let mut reached = BTreeMap::new();
        let mut pending: Vec<String> = Vec::new();
        walk(node, &mut |n| push_reference(n, &mut pending));

        while let Some(name) = pending.pop() {
            let Some((key, definition)) = self.defs.get_key_value(name.as_str()) else {
                continue;
            };
            if reached.insert(*key, *definition).is_some() {
                continue;
            }
            walk(*definition, &mut |n| push_reference(n, &mut pending));
        }
        reached
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Reject records that contain each other through plain fields.
    ///
    /// Such a type would be infinitely large. Arrays, maps and unions are
    /// the indirections that make recursion legal.
    pub(crate) fn check_acyclic(&self) -> Result<(), SchemaModelError> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

        for (name, node) in &self.defs {
            if matches!(node, SchemaNode::Record(_)) {
                indices.insert(*name, graph.add_node(*name));
            }
        }

        for (name, node) in &self.defs {
            let SchemaNode::Record(record) = node else {
                continue;
            };
            let from = indices[name];
            for field in &record.fields {
                let target = match &field.node {
                    SchemaNode::Record(inner) => Some(inner.name.as_str()),
                    SchemaNode::Ref(target) => Some(target.as_str()),
                    _ => None,
                };
                if let Some(to) = target.and_then(|t| indices.get(t)) {
                    graph.add_edge(from, *to, ());
                }
            }
        }

        for scc in kosaraju_scc(&graph) {
            let cyclic = scc.len() > 1 || graph.contains_edge(scc[0], scc[0]);
            if cyclic {
                let mut members: Vec<String> = scc
                    .iter()
                    .filter_map(|idx| graph.node_weight(*idx))
                    .map(|name| name.to_string())
                    .collect();
                members.sort();
                return Err(SchemaModelError::CyclicReference(members));
            }
        }

        Ok(())
    }
}

fn definition_name(node: &SchemaNode) -> Option<&str> {
    match node {
        SchemaNode::Record(r) => Some(&r.name),
        SchemaNode::Enum(e) => Some(&e.name),
        SchemaNode::Fixed(f) => Some(&f.name),
        _ => None,
    }
}

fn push_reference(node: &SchemaNode, pending: &mut Vec<String>) {
    if let SchemaNode::Ref(name) = node {
        pending.push(name.clone());
    }
}

/// Pre-order traversal over a tree (references are not followed)
pub(crate) fn walk<'a>(node: &'a SchemaNode, visit: &mut impl FnMut(&'a SchemaNode)) {
    visit(node);
    match node {
        SchemaNode::Record(record) => {
            for field in &record.fields {
                walk(&field.node, visit);
            }
        }
        SchemaNode::Array(items) => walk(items, visit),
        SchemaNode::Map(values) => walk(values, visit),
        SchemaNode::Union(branches) => {
            for branch in branches {
                walk(branch, visit);
            }
        }
        SchemaNode::Primitive(_)
        | SchemaNode::Logical { .. }
        | SchemaNode::Enum(_)
        | SchemaNode::Fixed(_)
        | SchemaNode::Ref(_) => {}
    }
}
