//! Formatting and provenance captured while loading.

use crate::schema::Slot;
use crate::tree::NodeId;
use crate::value::{Handle, Value};
use std::collections::HashMap;

/// Position of a child inside its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildKey {
    Attr(String),
    Entry(Value),
    Index(usize),
}

/// Source nodes a child was loaded from: the key node of its pair, if any,
/// and the value node as written (possibly an alias).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub key: Option<NodeId>,
    pub value: NodeId,
}

/// MergeLink records that a record inherited from `parent` through a merge
/// key or an alias.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeLink {
    pub parent: Handle,
    /// Attributes the parent could supply when the child was loaded.
    pub attributes: Vec<String>,
    /// The merge pair the link was read from.
    pub origin: Option<Origin>,
}

impl MergeLink {
    pub fn new(parent: Handle) -> Self {
        MergeLink {
            parent,
            attributes: Vec::new(),
            origin: None,
        }
    }
}

/// RoundTrip is the per-entity metadata replayed on dump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundTrip {
    /// The node the entity was loaded from.
    pub node: Option<NodeId>,
    /// Order in which attributes and entries were written.
    pub order: Vec<Slot>,
    pub merge_links: Vec<MergeLink>,
    /// Number of regular pairs written before the first merge key.
    pub merge_position: usize,
    /// Whether the parents were written as a sequence (`<<: [*a, *b]`).
    pub merge_as_sequence: bool,
    pub origins: HashMap<ChildKey, Origin>,
}

impl RoundTrip {
    pub fn origin(&self, key: &ChildKey) -> Option<Origin> {
        self.origins.get(key).copied()
    }

    /// Removes the slot of an attribute or entry from the written order.
    pub fn forget(&mut self, slot: &Slot) {
        self.order.retain(|s| s != slot);
        let key = match slot {
            Slot::Attr(name) => ChildKey::Attr(name.clone()),
            Slot::Entry(key) => ChildKey::Entry(key.clone()),
        };
        self.origins.remove(&key);
    }

    /// Shifts sequence origins after the item at `index` was removed.
    pub fn remove_index(&mut self, index: usize) {
        let shifted: HashMap<ChildKey, Origin> = self
            .origins
            .drain()
            .filter_map(|(key, origin)| match key {
                ChildKey::Index(i) if i == index => None,
                ChildKey::Index(i) if i > index => Some((ChildKey::Index(i - 1), origin)),
                other => Some((other, origin)),
            })
            .collect();
        self.origins = shifted;
    }
}
