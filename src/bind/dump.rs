//! Dump path: rebuilds a node tree from an entity graph.

use super::dynamic::DynamicDecoder;
use super::value_of;
use crate::error::{BindError, ErrorKind, Result};
use crate::fieldpath::PathElement;
use crate::graph::{ChildKey, Entity, EntityData, Graph, MergeLink, Origin, RoundTrip};
use crate::schema::{Attribute, AttributeCollection, Schema, Slot, TypeDef, TypeKind, TypeRef};
use crate::tree::{
    represent, resolve_scalar, CollectionStyle, Node, NodeId, NodeKind, NodeMeta, ScalarNode, Tree,
    MERGE_TAG,
};
use crate::value::{coerce, Handle, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// DumpSession writes one document.
///
/// `emitted` maps entities to the node written for them and `replayed` maps
/// source nodes to their copies, so a second reference to either becomes an
/// alias. Both are filled before children are written.
pub(crate) struct DumpSession<'a> {
    schema: &'a Schema,
    graph: &'a Graph,
    source: &'a Tree,
    out: Tree,
    emitted: HashMap<Handle, NodeId>,
    replayed: HashMap<NodeId, NodeId>,
    decoder: DynamicDecoder,
    depth: usize,
    max_depth: usize,
}

impl<'a> DumpSession<'a> {
    /// Creates a session; `source` is the tree the graph was loaded from,
    /// or an empty tree for documents built in memory.
    pub fn new(schema: &'a Schema, graph: &'a Graph, source: &'a Tree, max_depth: usize) -> Self {
        DumpSession {
            schema,
            graph,
            source,
            out: Tree::new(),
            emitted: HashMap::new(),
            replayed: HashMap::new(),
            decoder: DynamicDecoder::new(max_depth),
            depth: 0,
            max_depth,
        }
    }

    pub fn dump(mut self, type_ref: &TypeRef, value: &Value) -> Result<Tree> {
        debug!(%type_ref, entities = self.graph.len(), "dumping document");
        let origin = self.source.root().map(|root| Origin {
            key: None,
            value: root,
        });
        let root = self.dump_value(type_ref, None, value, origin)?;
        self.out.set_root(root);
        self.out.trailing_comments = self.source.trailing_comments.clone();
        debug!(nodes = self.out.len(), "dumped document");
        Ok(self.out)
    }

    /// Comments of the occurrence a child was loaded from.
    fn occurrence(&self, origin: Option<Origin>) -> NodeMeta {
        origin
            .map(|o| self.source.get(o.value).meta.occurrence())
            .unwrap_or_default()
    }

    fn alias(&mut self, target: NodeId, origin: Option<Origin>) -> NodeId {
        let meta = self.occurrence(origin);
        self.out.alias(target, meta)
    }

    /// Metadata for a freshly written composite: the anchor, tag and layout
    /// of the node it was loaded from, plus the comments of the occurrence
    /// it is written at.
    fn entity_meta(&self, node: Option<NodeId>, origin: Option<Origin>) -> NodeMeta {
        let mut meta = node
            .map(|n| self.source.get(n).meta.clone())
            .unwrap_or_default();
        meta.leading_comments.clear();
        meta.trailing_comment = None;

        let here = match (node, origin) {
            (None, _) => true,
            (Some(n), Some(o)) => self.source.resolve(o.value) == n,
            (Some(_), None) => false,
        };
        if here {
            let occurrence = self.occurrence(origin);
            meta.leading_comments = occurrence.leading_comments;
            meta.trailing_comment = occurrence.trailing_comment;
        }
        meta
    }

    fn dump_value(
        &mut self,
        type_ref: &TypeRef,
        default: Option<&Value>,
        value: &Value,
        origin: Option<Origin>,
    ) -> Result<NodeId> {
        if self.depth >= self.max_depth {
            return Err(ErrorKind::RecursionLimit {
                limit: self.max_depth,
            }
            .into());
        }
        self.depth += 1;
        let result = self.dump_typed(type_ref, default, value, origin);
        self.depth -= 1;
        result
    }

    fn dump_typed(
        &mut self,
        type_ref: &TypeRef,
        default: Option<&Value>,
        value: &Value,
        origin: Option<Origin>,
    ) -> Result<NodeId> {
        match type_ref {
            TypeRef::Any => self.dump_dynamic(value, origin),
            TypeRef::Primitive(p) => {
                let coerced = coerce(value, *p, default)?;
                self.scalar_node(&coerced, origin, |raw| {
                    coerce(raw, *p, default).ok().as_ref() == Some(&coerced)
                })
            }
            TypeRef::Named(name) => match value {
                Value::Ref(handle) => {
                    self.graph.check(*handle)?;
                    let entity = self.graph.get(*handle);
                    if &entity.type_name != name {
                        return Err(ErrorKind::structural(
                            name.as_str(),
                            format!("`{}` value", entity.type_name),
                        )
                        .into());
                    }
                    self.dump_entity(*handle, origin)
                }
                other if default == Some(other) => self.scalar_node(other, origin, |raw| raw == other),
                other => Err(ErrorKind::structural(name.as_str(), other.type_name()).into()),
            },
        }
    }

    /// Writes a scalar, replaying the source scalar when it still reads as
    /// the same value.
    fn scalar_node<F>(&mut self, value: &Value, origin: Option<Origin>, matches: F) -> Result<NodeId>
    where
        F: Fn(&Value) -> bool,
    {
        let source = self.source;
        if let Some(o) = origin {
            let src = source.resolve(o.value);
            let node = source.get(src);
            if let NodeKind::Scalar(scalar) = &node.kind {
                if !node.meta.is_merge() && matches(&resolve_scalar(scalar, node.meta.tag.as_deref())) {
                    if let Some(&copy) = self.replayed.get(&src) {
                        return Ok(self.alias(copy, origin));
                    }
                    let mut meta = node.meta.clone();
                    if src != o.value {
                        let occurrence = self.occurrence(origin);
                        meta.leading_comments = occurrence.leading_comments;
                        meta.trailing_comment = occurrence.trailing_comment;
                    }
                    let id = self.out.scalar(scalar.clone(), meta);
                    self.replayed.insert(src, id);
                    return Ok(id);
                }
            }
        }

        let scalar = represent(value)
            .ok_or_else(|| BindError::new(ErrorKind::structural("scalar", value.type_name())))?;
        let meta = self.occurrence(origin);
        Ok(self.out.scalar(scalar, meta))
    }

    /// Writes the key of an attribute pair, replaying the source key.
    fn key_node(&mut self, text: &str, origin: Option<Origin>) -> NodeId {
        let source = self.source;
        if let Some(k) = origin.and_then(|o| o.key) {
            let node = source.get(k);
            if let NodeKind::Scalar(scalar) = &node.kind {
                if scalar.text == text && !node.meta.is_merge() {
                    let id = self.out.add(node.clone());
                    self.replayed.insert(k, id);
                    return id;
                }
            }
        }
        let scalar = represent(&Value::from(text)).unwrap_or_else(|| ScalarNode::plain(text));
        self.out.scalar(scalar, NodeMeta::default())
    }

    /// Writes the key of a map or keyed list entry.
    fn entry_key(&mut self, key_type: &TypeRef, key: &Value, origin: Option<Origin>) -> Result<NodeId> {
        let source = origin.and_then(|o| o.key).map(|k| Origin { key: None, value: k });
        match key_type {
            TypeRef::Primitive(p) => {
                let coerced = coerce(key, *p, None)?;
                self.scalar_node(&coerced, source, |raw| {
                    coerce(raw, *p, None).ok().as_ref() == Some(&coerced)
                })
            }
            TypeRef::Any | TypeRef::Named(_) => self.dump_dynamic(key, source),
        }
    }

    fn dump_entity(&mut self, handle: Handle, origin: Option<Origin>) -> Result<NodeId> {
        self.graph.check(handle)?;
        if let Some(&node) = self.emitted.get(&handle) {
            trace!(%handle, "entity already written, aliasing");
            return Ok(self.alias(node, origin));
        }

        let graph = self.graph;
        let schema = self.schema;
        let entity = graph.get(handle);
        let def = schema.lookup(&entity.type_name)?;
        trace!(%handle, type_name = %entity.type_name, "writing entity");
        match &def.kind {
            TypeKind::Record { attributes } => self.dump_record(handle, def, attributes, None, origin),
            TypeKind::Sequence { item } => self.dump_sequence(handle, item, origin),
            TypeKind::Map {
                key,
                value,
                attributes,
            } => self.dump_map(handle, def, key, value, attributes, origin),
            TypeKind::KeyedList {
                key_attr,
                item,
                attributes,
            } => self.dump_keyed_list(handle, def, key_attr, item, attributes, origin),
        }
    }

    /// Reserves the node of a composite before its children are written.
    fn register(&mut self, handle: Handle, round_trip: &RoundTrip) -> NodeId {
        let node = self.out.reserve();
        self.emitted.insert(handle, node);
        if let Some(src) = round_trip.node {
            self.replayed.insert(src, node);
        }
        node
    }

    /// Attributes to write, in order: observed first, then declaration
    /// order, without unobserved attributes holding their default.
    fn static_order(&self, entity: &Entity, attributes: &AttributeCollection, entries: &[Value]) -> Vec<Slot> {
        let schema = self.schema;
        attributes.dump_order(&entity.round_trip.order, entries, |a: &Attribute| {
            a.default_value().is_some()
                && value_of(schema, entity, a.name()).as_ref() == a.default_value()
        })
    }

    fn check_required(&self, def: &TypeDef, attributes: &AttributeCollection, entity: &Entity) -> Result<()> {
        let missing: Vec<String> = attributes
            .required()
            .filter(|a| entity.field(a.name()).is_none())
            .map(|a| a.name().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ErrorKind::missing_required(def.name.as_str(), missing).into())
        }
    }

    fn attribute_pair(&mut self, entity: &Entity, attribute: &Attribute) -> Result<(NodeId, NodeId)> {
        let name = attribute.name();
        let value = value_of(self.schema, entity, name).unwrap_or_default();
        let origin = entity.round_trip.origin(&ChildKey::Attr(name.to_string()));
        let key = self.key_node(attribute.wire_key(), origin);
        let value = self
            .dump_value(attribute.type_ref(), attribute.default_value(), &value, origin)
            .map_err(|e| e.within(PathElement::field_name(name)))?;
        Ok((key, value))
    }

    /// Merge links whose parent was written earlier in this pass and still
    /// resolves at least one logged attribute to its current value, defaults
    /// included, with the node of that parent.
    fn surviving_links<'e>(
        &self,
        entity: &'e Entity,
        represented: &mut HashSet<String>,
    ) -> Vec<(&'e MergeLink, NodeId)> {
        let mut surviving = Vec::new();
        for link in &entity.round_trip.merge_links {
            let parent_node = match self.emitted.get(&link.parent) {
                Some(&node) => node,
                None => {
                    debug!(parent = %link.parent, "merge parent not written before child, link dropped");
                    continue;
                }
            };
            let parent = self.graph.get(link.parent);
            let explained: Vec<&String> = link
                .attributes
                .iter()
                .filter(|name| match value_of(self.schema, parent, name.as_str()) {
                    Some(supplied) => value_of(self.schema, entity, name.as_str()) == Some(supplied),
                    None => false,
                })
                .collect();
            if explained.is_empty() {
                debug!(parent = %link.parent, "merge parent no longer supplies any value, link dropped");
                continue;
            }
            debug!(parent = %link.parent, attributes = explained.len(), "merge link kept");
            represented.extend(explained.into_iter().cloned());
            surviving.push((link, parent_node));
        }
        surviving
    }

    fn merge_key(&mut self, origin: Option<Origin>) -> NodeId {
        match origin.and_then(|o| o.key) {
            Some(k) if self.source.is_merge_key(k) => self.out.add(self.source.get(k).clone()),
            _ => {
                let meta = NodeMeta {
                    tag: Some(MERGE_TAG.to_string()),
                    ..NodeMeta::default()
                };
                self.out.scalar(ScalarNode::plain("<<"), meta)
            }
        }
    }

    fn merge_pairs(&mut self, round_trip: &RoundTrip, surviving: &[(&MergeLink, NodeId)]) -> Vec<(NodeId, NodeId)> {
        if round_trip.merge_as_sequence && surviving.len() > 1 {
            let origin = surviving[0].0.origin;
            let key = self.merge_key(origin);
            let items = surviving
                .iter()
                .map(|&(_, parent)| self.out.alias(parent, NodeMeta::default()))
                .collect();
            let meta = match origin {
                Some(o) => NodeMeta {
                    anchor: None,
                    ..self.source.get(o.value).meta.clone()
                },
                None => NodeMeta {
                    style: CollectionStyle::Flow,
                    ..NodeMeta::default()
                },
            };
            let parents = self.out.add(Node::with_meta(NodeKind::Sequence(items), meta));
            return vec![(key, parents)];
        }

        surviving
            .iter()
            .map(|&(link, parent)| {
                let key = self.merge_key(link.origin);
                let occurrence = link.origin.filter(|o| o.key.is_some());
                (key, self.alias(parent, occurrence))
            })
            .collect()
    }

    /// Whether `parent` has the type of `entity` and agrees with it on every
    /// attribute but the key, so an alias to it reloads the same values.
    fn mirrors(
        &self,
        entity: &Entity,
        parent: &Entity,
        attributes: &AttributeCollection,
        key_attr: Option<&str>,
    ) -> bool {
        parent.type_name == entity.type_name
            && attributes
                .iter()
                .filter(|a| Some(a.name()) != key_attr)
                .all(|a| value_of(self.schema, parent, a.name()) == value_of(self.schema, entity, a.name()))
    }

    fn dump_record(
        &mut self,
        handle: Handle,
        def: &TypeDef,
        attributes: &AttributeCollection,
        key_attr: Option<&str>,
        origin: Option<Origin>,
    ) -> Result<NodeId> {
        let graph = self.graph;
        let entity = graph.get(handle);
        let round_trip = &entity.round_trip;
        self.check_required(def, attributes, entity)?;

        let mut represented = HashSet::new();
        let surviving = self.surviving_links(entity, &mut represented);
        let order = self.static_order(entity, attributes, &[]);
        let body: Vec<&str> = order
            .iter()
            .filter_map(|slot| match slot {
                Slot::Attr(name) if Some(name.as_str()) != key_attr => Some(name.as_str()),
                _ => None,
            })
            .collect();

        if surviving.len() == 1
            && body.iter().all(|name| represented.contains(*name))
            && self.mirrors(entity, graph.get(surviving[0].0.parent), attributes, key_attr)
        {
            let (link, parent) = surviving[0];
            debug!(%handle, parent = %link.parent, "collapsed to alias of merge parent");
            return Ok(self.alias(parent, origin));
        }

        let node = self.register(handle, round_trip);
        let mut pairs = Vec::with_capacity(body.len());
        for name in body {
            if represented.contains(name) {
                continue;
            }
            if let Some(attribute) = attributes.by_name(name) {
                pairs.push(self.attribute_pair(entity, attribute)?);
            }
        }
        let merges = self.merge_pairs(round_trip, &surviving);
        let at = round_trip.merge_position.min(pairs.len());
        pairs.splice(at..at, merges);

        let meta = self.entity_meta(round_trip.node, origin);
        self.out.fill(node, Node::with_meta(NodeKind::Mapping(pairs), meta));
        Ok(node)
    }

    fn dump_sequence(&mut self, handle: Handle, item: &TypeRef, origin: Option<Origin>) -> Result<NodeId> {
        let graph = self.graph;
        let entity = graph.get(handle);
        let values = match &entity.data {
            EntityData::Sequence(values) => values,
            _ => return Err(ErrorKind::not_a(format!("sequence ({})", entity.type_name)).into()),
        };
        let round_trip = &entity.round_trip;

        let node = self.register(handle, round_trip);
        let mut items = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let child = round_trip.origin(&ChildKey::Index(i));
            let id = self
                .dump_value(item, None, value, child)
                .map_err(|e| e.within(PathElement::index(i)))?;
            items.push(id);
        }

        let meta = self.entity_meta(round_trip.node, origin);
        self.out.fill(node, Node::with_meta(NodeKind::Sequence(items), meta));
        Ok(node)
    }

    fn dump_map(
        &mut self,
        handle: Handle,
        def: &TypeDef,
        key_type: &TypeRef,
        value_type: &TypeRef,
        attributes: &AttributeCollection,
        origin: Option<Origin>,
    ) -> Result<NodeId> {
        let graph = self.graph;
        let entity = graph.get(handle);
        let entries = match &entity.data {
            EntityData::Map { entries, .. } => entries,
            _ => return Err(ErrorKind::not_a(format!("map ({})", entity.type_name)).into()),
        };
        let round_trip = &entity.round_trip;
        self.check_required(def, attributes, entity)?;

        let keys: Vec<Value> = entries.keys().cloned().collect();
        let order = self.static_order(entity, attributes, &keys);
        let node = self.register(handle, round_trip);
        let mut pairs = Vec::with_capacity(order.len());
        for slot in &order {
            match slot {
                Slot::Attr(name) => {
                    if let Some(attribute) = attributes.by_name(name) {
                        pairs.push(self.attribute_pair(entity, attribute)?);
                    }
                }
                Slot::Entry(key) => {
                    let value = match entries.get(key) {
                        Some(value) => value,
                        None => continue,
                    };
                    let child = round_trip.origin(&ChildKey::Entry(key.clone()));
                    let k = self
                        .entry_key(key_type, key, child)
                        .map_err(|e| e.within(PathElement::key(key.clone())))?;
                    let v = self
                        .dump_value(value_type, None, value, child)
                        .map_err(|e| e.within(PathElement::key(key.clone())))?;
                    pairs.push((k, v));
                }
            }
        }

        let meta = self.entity_meta(round_trip.node, origin);
        self.out.fill(node, Node::with_meta(NodeKind::Mapping(pairs), meta));
        Ok(node)
    }

    fn dump_keyed_list(
        &mut self,
        handle: Handle,
        def: &TypeDef,
        key_attr: &str,
        item: &TypeRef,
        attributes: &AttributeCollection,
        origin: Option<Origin>,
    ) -> Result<NodeId> {
        let graph = self.graph;
        let schema = self.schema;
        let entity = graph.get(handle);
        let entries = match &entity.data {
            EntityData::KeyedList { entries, .. } => entries,
            _ => return Err(ErrorKind::not_a(format!("keyed list ({})", entity.type_name)).into()),
        };
        let item_def = schema.lookup(item.as_named().unwrap_or_default())?;
        let (item_attributes, key_attribute) = item_def
            .attributes()
            .and_then(|a| a.by_name(key_attr).map(|k| (a, k)))
            .ok_or_else(|| ErrorKind::unknown_attribute(item_def.name.as_str(), key_attr))?;
        let round_trip = &entity.round_trip;
        self.check_required(def, attributes, entity)?;

        let keys: Vec<Value> = entries.keys().cloned().collect();
        let order = self.static_order(entity, attributes, &keys);
        let node = self.register(handle, round_trip);
        let mut pairs = Vec::with_capacity(order.len());
        for slot in &order {
            match slot {
                Slot::Attr(name) => {
                    if let Some(attribute) = attributes.by_name(name) {
                        pairs.push(self.attribute_pair(entity, attribute)?);
                    }
                }
                Slot::Entry(key) => {
                    let item_handle = match entries.get(key) {
                        Some(&h) => h,
                        None => continue,
                    };
                    let pair = self
                        .keyed_pair(item_def, item_attributes, key_attribute, item_handle, round_trip, key)
                        .map_err(|e| e.within(PathElement::key(key.clone())))?;
                    pairs.push(pair);
                }
            }
        }

        let meta = self.entity_meta(round_trip.node, origin);
        self.out.fill(node, Node::with_meta(NodeKind::Mapping(pairs), meta));
        Ok(node)
    }

    /// Writes one keyed list item: its current key, then its body without
    /// the key attribute.
    fn keyed_pair(
        &mut self,
        def: &TypeDef,
        attributes: &AttributeCollection,
        key_attribute: &Attribute,
        handle: Handle,
        container: &RoundTrip,
        key: &Value,
    ) -> Result<(NodeId, NodeId)> {
        self.graph.check(handle)?;
        let graph = self.graph;
        let item = graph.get(handle);
        if item.type_name != def.name {
            return Err(ErrorKind::structural(
                def.name.as_str(),
                format!("`{}` value", item.type_name),
            )
            .into());
        }

        let child = container.origin(&ChildKey::Entry(key.clone()));
        let current = value_of(self.schema, item, key_attribute.name()).unwrap_or_default();
        let k = self.entry_key(key_attribute.type_ref(), &current, child)?;
        let v = match self.emitted.get(&handle) {
            Some(&node) => self.alias(node, child),
            None => self.dump_record(handle, def, attributes, Some(key_attribute.name()), child)?,
        };
        Ok((k, v))
    }

    fn dump_dynamic(&mut self, value: &Value, origin: Option<Origin>) -> Result<NodeId> {
        if let Value::Ref(handle) = value {
            return self.dump_entity(*handle, origin);
        }

        if let Some(o) = origin {
            let src = self.source.resolve(o.value);
            let decoded = self.decoder.decode(self.source, src).ok();
            if decoded.as_ref() == Some(value) {
                if let Some(&copy) = self.replayed.get(&src) {
                    return Ok(self.alias(copy, origin));
                }
                if self.is_closed(src) {
                    let id = self.out.copy_from(self.source, src, &mut self.replayed);
                    if src != o.value {
                        let occurrence = self.occurrence(origin);
                        let meta = &mut self.out.get_mut(id).meta;
                        meta.leading_comments = occurrence.leading_comments;
                        meta.trailing_comment = occurrence.trailing_comment;
                    }
                    return Ok(id);
                }
            }
        }
        self.fresh_dynamic(value, origin)
    }

    /// Returns true if every alias inside the subtree at `id` targets a node
    /// of the subtree or a node already written.
    fn is_closed(&self, id: NodeId) -> bool {
        let mut inside = HashSet::new();
        let mut targets = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if !inside.insert(id) {
                continue;
            }
            match &self.source.get(id).kind {
                NodeKind::Mapping(pairs) => {
                    for &(k, v) in pairs {
                        stack.push(k);
                        stack.push(v);
                    }
                }
                NodeKind::Sequence(items) => stack.extend(items),
                NodeKind::Alias(target) => targets.push(self.source.resolve(*target)),
                NodeKind::Scalar(_) => {}
            }
        }
        targets
            .iter()
            .all(|t| inside.contains(t) || self.replayed.contains_key(t))
    }

    fn fresh_dynamic(&mut self, value: &Value, origin: Option<Origin>) -> Result<NodeId> {
        let meta = self.occurrence(origin);
        let kind = match value {
            Value::Ref(handle) => return self.dump_entity(*handle, origin),
            Value::List(items) => {
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    children.push(self.fresh_dynamic(item, None)?);
                }
                NodeKind::Sequence(children)
            }
            Value::Map(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let k = self.fresh_dynamic(k, None)?;
                    let v = self.fresh_dynamic(v, None)?;
                    pairs.push((k, v));
                }
                NodeKind::Mapping(pairs)
            }
            scalar => {
                let scalar = represent(scalar).ok_or_else(|| {
                    BindError::new(ErrorKind::structural("scalar", scalar.type_name()))
                })?;
                NodeKind::Scalar(scalar)
            }
        };
        Ok(self.out.add(Node::with_meta(kind, meta)))
    }
}
