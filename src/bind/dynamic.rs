//! Decoding of untyped (`any`) content.

use crate::error::{BindError, ErrorKind, Result};
use crate::tree::{resolve_scalar, NodeId, NodeKind, Tree};
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Decodes nodes into dynamic [`Value`]s.
///
/// Results are cached per node so a shared node decodes once. Merge keys
/// add the parent's pairs whose keys the mapping does not already have.
#[derive(Debug)]
pub(crate) struct DynamicDecoder {
    cache: HashMap<NodeId, Value>,
    in_progress: HashSet<NodeId>,
    max_depth: usize,
}

impl DynamicDecoder {
    pub fn new(max_depth: usize) -> Self {
        DynamicDecoder {
            cache: HashMap::new(),
            in_progress: HashSet::new(),
            max_depth,
        }
    }

    /// Returns true if `id` was decoded as part of some dynamic value.
    pub fn contains(&self, id: NodeId) -> bool {
        self.cache.contains_key(&id)
    }

    pub fn decode(&mut self, tree: &Tree, id: NodeId) -> Result<Value> {
        let id = tree.resolve(id);
        if let Some(value) = self.cache.get(&id) {
            return Ok(value.clone());
        }
        let mark = tree.get(id).mark;
        if self.in_progress.contains(&id) {
            return Err(BindError::new(ErrorKind::structural(
                "acyclic dynamic value",
                "recursive alias",
            ))
            .at(mark));
        }
        if self.in_progress.len() >= self.max_depth {
            return Err(BindError::new(ErrorKind::RecursionLimit {
                limit: self.max_depth,
            })
            .at(mark));
        }

        self.in_progress.insert(id);
        let value = self.decode_node(tree, id);
        self.in_progress.remove(&id);
        let value = value?;
        self.cache.insert(id, value.clone());
        Ok(value)
    }

    fn decode_node(&mut self, tree: &Tree, id: NodeId) -> Result<Value> {
        let node = tree.get(id);
        match &node.kind {
            NodeKind::Scalar(scalar) => Ok(resolve_scalar(scalar, node.meta.tag.as_deref())),
            NodeKind::Sequence(items) => items
                .iter()
                .map(|&item| self.decode(tree, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            NodeKind::Mapping(pairs) => {
                let mut entries: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
                let mut merged = Vec::new();
                for &(k, v) in pairs {
                    if tree.is_merge_key(k) {
                        merged.extend(merge_targets(tree, v));
                        continue;
                    }
                    let key = self.decode(tree, k)?;
                    let value = self.decode(tree, v)?;
                    match entries.iter_mut().find(|(existing, _)| *existing == key) {
                        Some(entry) => entry.1 = value,
                        None => entries.push((key, value)),
                    }
                }

                for parent in merged {
                    if let Value::Map(parent_entries) = self.decode(tree, parent)? {
                        for (key, value) in parent_entries {
                            if !entries.iter().any(|(existing, _)| *existing == key) {
                                entries.push((key, value));
                            }
                        }
                    }
                }
                Ok(Value::Map(entries))
            }
            NodeKind::Alias(target) => self.decode(tree, *target),
        }
    }
}

/// Nodes a merge value refers to: the value itself, or each item of a
/// sequence of parents.
pub(crate) fn merge_targets(tree: &Tree, value: NodeId) -> Vec<NodeId> {
    let resolved = tree.resolve(value);
    match &tree.get(resolved).kind {
        NodeKind::Sequence(items) if resolved == value => {
            items.iter().map(|&item| tree.resolve(item)).collect()
        }
        _ => vec![resolved],
    }
}
